//! Schema-driven CSV loading and account reports.
//!
//! A load run reads a schema description, recreates the tables it describes,
//! then appends every data file in a directory to the table named after the
//! file. Afterwards [`queries`] answers three questions about the loaded
//! accounts.
//!
//! ```rust,ignore
//! use ledgerload::{config, loader};
//! use std::path::Path;
//!
//! let conn = config::connect(None)?;
//! let summary = loader::run_load(
//!     &conn,
//!     Path::new("data/INFORMATION_SCHEMA.csv"),
//!     Path::new("data"),
//! )?;
//! println!("{} rows", summary.rows_inserted());
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod loader;
pub mod queries;
pub mod schema;
pub mod tables;
pub mod types;
pub mod validate;

pub use error::{IngestError, LoadError, QueryError, Result};
pub use loader::{load_all, load_file, run_load, FileOutcome, FileStatus, LoadSummary};
pub use queries::{
    overdrawn_checking_accounts, overpaid_loans, total_assets, OverdrawnAccount, OverpaidLoan,
    QueryReport,
};
pub use schema::{load_schema, SchemaColumn, SchemaDefinition, TableSchema};
pub use tables::{create_tables, create_tables_from_path};
pub use types::{map_type, ColumnType, DecimalSpec};
pub use validate::{validate_columns, ReconciliationPlan, ValidationResult};
