//! Error types for the store layer.

use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The connection target is not something this crate can open.
    #[error("Backend not available: {0}")]
    NotAvailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}

impl BackendError {
    /// True when the store reported a reference to a relation it does not know.
    pub fn is_missing_table(&self) -> bool {
        let message = self.to_string();
        message.contains("Catalog Error") && message.contains("does not exist")
    }
}
