//! CLI module for ledgerload
//!
//! One submodule per command plus shared error and output helpers.

pub mod error;
pub mod output;

pub mod config;
pub mod load;
pub mod queries;
