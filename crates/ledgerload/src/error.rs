//! Error types for loading and reporting.
//!
//! Fatal categories abort a load run and surface through [`LoadError`].
//! Per-file categories ([`IngestError`]) are caught by the batch loader and
//! recorded in the run summary; they never escape `load_all`.

use ledgerload_db::BackendError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for fatal load-run operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Failures that stop a whole load run.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Missing or unusable store connection target.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Schema description missing, unreadable, or malformed.
    #[error("Failed to parse schema {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// The store rejected a DROP or CREATE for a described table.
    #[error("Failed to build table {table}: {source}")]
    SchemaBuild {
        table: String,
        #[source]
        source: BackendError,
    },

    /// The data directory could not be listed.
    #[error("Failed to read data directory {}: {source}", path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Failures confined to a single data file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Cannot read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A cell could not be converted to its column's declared type.
    #[error("Row {row}, column {column}: cannot convert '{value}' to {expected}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
        expected: String,
    },

    /// The store rejected the insert.
    #[error("Insert failed: {0}")]
    Insert(#[source] BackendError),
}

/// Failures from the analysis reports.
#[derive(Debug, Error)]
pub enum QueryError {
    /// One or more tables the reports join over have not been created.
    #[error("Required tables not found: {}", .0.join(", "))]
    TablesMissing(Vec<String>),

    #[error("Query failed: {0}")]
    Database(#[from] BackendError),
}

impl QueryError {
    pub fn is_tables_missing(&self) -> bool {
        match self {
            QueryError::TablesMissing(_) => true,
            QueryError::Database(err) => err.is_missing_table(),
        }
    }
}
