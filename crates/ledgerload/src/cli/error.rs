//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use ledgerload::{LoadError, QueryError};
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// No store URL configured, or the URL cannot be opened
    pub fn store_not_configured(detail: &str) -> Self {
        Self::new("Database connection is not configured")
            .with_context(detail.to_string())
            .with_suggestions([
                "TRY: export DATABASE_URL=duckdb:./ledger.duckdb".to_string(),
                "TRY: Pass --database-url duckdb:<path>".to_string(),
                "TRY: Use duckdb::memory: for a throwaway store".to_string(),
            ])
    }

    /// Schema description missing or malformed
    pub fn schema_unreadable(path: &Path, detail: &str) -> Self {
        Self::new(format!("Cannot use schema description: {}", path.display()))
            .with_context(detail.to_string())
            .with_suggestions([
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
                "TRY: The header must be TABLE_NAME,COLUMN_NAME,DATA_TYPE".to_string(),
                "TRY: Point at another file with --schema PATH".to_string(),
            ])
    }

    /// Data directory cannot be listed
    pub fn data_dir_unreadable(path: &Path, detail: &str) -> Self {
        Self::new(format!("Cannot read data directory: {}", path.display()))
            .with_context(detail.to_string())
            .with_suggestions([
                format!("TRY: Check that the directory exists: ls -la {}", path.display()),
                "TRY: Point at another directory with --data-dir DIR".to_string(),
            ])
    }

    /// The store refused to build a table
    pub fn table_build_failed(table: &str, detail: &str) -> Self {
        Self::new(format!("Failed to create table {}", table))
            .with_context(detail.to_string())
            .with_suggestion(format!(
                "TRY: Check the DATA_TYPE entries for {} in the schema description",
                table
            ))
    }

    /// Report tables have not been loaded yet
    pub fn tables_missing(missing: &[String]) -> Self {
        Self::new(format!("Required tables not found: {}", missing.join(", ")))
            .with_context("The reports need CHECKING, LOANS, ACCOUNTS, MEMBERS and TRANSACTIONS")
            .with_suggestion("TRY: Run `ledgerload load` first")
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

impl From<LoadError> for HelpfulError {
    fn from(err: LoadError) -> Self {
        match &err {
            LoadError::Configuration(detail) => Self::store_not_configured(detail),
            LoadError::Parse { path, message } => Self::schema_unreadable(path, message),
            LoadError::SchemaBuild { table, source } => {
                Self::table_build_failed(table, &source.to_string())
            }
            LoadError::DataDir { path, source } => {
                Self::data_dir_unreadable(path, &source.to_string())
            }
        }
    }
}

impl From<QueryError> for HelpfulError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::TablesMissing(missing) => Self::tables_missing(&missing),
            QueryError::Database(source) if source.is_missing_table() => {
                Self::new("Report query failed: a required table does not exist")
                    .with_context(source.to_string())
                    .with_suggestion("TRY: Run `ledgerload load` first")
            }
            QueryError::Database(source) => Self::new("Report query failed")
                .with_context(source.to_string())
                .with_suggestion("TRY: Re-run with -v to see the failing statement"),
        }
    }
}

/// Text shown on stderr when a command fails.
pub fn render(err: &anyhow::Error) -> String {
    match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => helpful.to_string(),
        None => format!("ERROR: {:#}", err),
    }
}
