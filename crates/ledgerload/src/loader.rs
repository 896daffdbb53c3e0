//! Batch loading of a directory of data files.
//!
//! Each file is its own unit of work: it is read, validated against the
//! schema, reconciled into declared column order, converted, and appended
//! to the table named after the file inside one transaction. A file that
//! fails is recorded in the [`LoadSummary`] and the run moves on. Only
//! failures that affect every file (an unreadable schema or data directory)
//! stop the run.

use crate::convert::convert_cell;
use crate::error::{IngestError, LoadError, Result};
use crate::schema::{SchemaDefinition, TableSchema};
use crate::tables::create_tables;
use crate::validate::{validate_columns, ReconciliationPlan, ValidationResult};
use ledgerload_db::{DbConnection, DbValue};
use serde::Serialize;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Recognized data-file extensions (case-insensitive) and their delimiters.
pub const DATA_EXTENSIONS: &[(&str, u8)] = &[("csv", b','), ("tsv", b'\t')];

/// Rows parsed from one data file.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    pub table: String,
    pub path: PathBuf,
    /// Header names in file order.
    pub columns: Vec<String>,
    pub records: Vec<csv::StringRecord>,
}

impl IngestBatch {
    /// Parse `path`; the target table is the file stem.
    pub fn read(path: &Path) -> std::result::Result<Self, IngestError> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter_for(path))
            .from_reader(file);

        let columns = reader.headers()?.iter().map(str::to_string).collect();
        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()?;

        Ok(Self {
            table: table_name_for(path),
            path: path.to_path_buf(),
            columns,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Loaded {
        rows_inserted: u64,
        /// Table row count read back after the insert, when available.
        row_count: Option<u64>,
    },
    /// Column validation refused the file.
    Skipped { reason: String },
    /// Reading, converting or inserting failed.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub table: String,
    pub status: FileStatus,
    /// Columns present in the file but not declared, dropped before insert.
    pub dropped_columns: Vec<String>,
    /// Set when the post-insert row count came back lower than expected.
    pub verification_warning: Option<String>,
}

impl FileOutcome {
    fn new(file: &Path, table: &str, status: FileStatus) -> Self {
        Self {
            file: file.to_path_buf(),
            table: table.to_string(),
            status,
            dropped_columns: Vec::new(),
            verification_warning: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.status, FileStatus::Loaded { .. })
    }

    pub fn rows_inserted(&self) -> u64 {
        match self.status {
            FileStatus::Loaded { rows_inserted, .. } => rows_inserted,
            _ => 0,
        }
    }
}

/// Per-file outcomes of one load run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub files: Vec<FileOutcome>,
}

impl LoadSummary {
    pub fn loaded(&self) -> usize {
        self.files.iter().filter(|f| f.is_loaded()).count()
    }

    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Failed { .. }))
            .count()
    }

    pub fn rows_inserted(&self) -> u64 {
        self.files.iter().map(FileOutcome::rows_inserted).sum()
    }

    pub fn warnings(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.verification_warning.is_some())
            .count()
    }

    pub fn outcome_for(&self, table: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|f| f.table == table)
    }
}

/// Target table for a data file: its base name without extension, verbatim.
pub fn table_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn data_extension(path: &Path) -> Option<&'static (&'static str, u8)> {
    let ext = path.extension()?.to_str()?;
    DATA_EXTENSIONS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
}

fn delimiter_for(path: &Path) -> u8 {
    data_extension(path).map(|(_, d)| *d).unwrap_or(b',')
}

/// Data files in `dir`, sorted by file name, excluding any file named like
/// the schema description.
pub fn discover_data_files(dir: &Path, exclude: Option<&OsStr>) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::DataDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::DataDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() || data_extension(&path).is_none() {
            continue;
        }
        if exclude.is_some_and(|name| path.file_name() == Some(name)) {
            debug!(file = %path.display(), "Skipping schema description");
            continue;
        }
        files.push(path);
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Load every data file in `data_dir` using the schema at `schema_path`.
///
/// Tables must already exist (see [`crate::tables::create_tables`]). Fails
/// only if the schema or the directory cannot be read; per-file problems
/// are reported in the returned summary.
pub fn load_all(conn: &DbConnection, data_dir: &Path, schema_path: &Path) -> Result<LoadSummary> {
    let schema = SchemaDefinition::from_path(schema_path)?;
    load_all_with_schema(conn, data_dir, &schema, schema_path.file_name())
}

/// [`load_all`] with an already-parsed schema.
pub fn load_all_with_schema(
    conn: &DbConnection,
    data_dir: &Path,
    schema: &SchemaDefinition,
    exclude: Option<&OsStr>,
) -> Result<LoadSummary> {
    let files = discover_data_files(data_dir, exclude)?;
    info!(
        dir = %data_dir.display(),
        files = files.len(),
        "Loading data files"
    );

    let mut summary = LoadSummary::default();
    for path in files {
        summary.files.push(load_file(conn, &path, schema));
    }

    info!(
        loaded = summary.loaded(),
        skipped = summary.skipped(),
        failed = summary.failed(),
        rows = summary.rows_inserted(),
        "Load run finished"
    );
    Ok(summary)
}

/// Recreate the described tables, then load every data file.
pub fn run_load(conn: &DbConnection, schema_path: &Path, data_dir: &Path) -> Result<LoadSummary> {
    let schema = SchemaDefinition::from_path(schema_path)?;
    create_tables(conn, &schema)?;
    load_all_with_schema(conn, data_dir, &schema, schema_path.file_name())
}

/// Load a single file into the table named after it.
pub fn load_file(conn: &DbConnection, path: &Path, schema: &SchemaDefinition) -> FileOutcome {
    let table = table_name_for(path);
    info!(file = %path.display(), table = %table, "Loading file");

    let batch = match IngestBatch::read(path) {
        Ok(batch) => batch,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "Skipping file");
            return FileOutcome::new(
                path,
                &table,
                FileStatus::Failed {
                    reason: err.to_string(),
                },
            );
        }
    };

    let validation = validate_columns(&table, &batch.columns, schema);
    let (plan, table_schema) = match (&validation, schema.table(&table)) {
        (ValidationResult::Accepted { plan, .. }, Some(table_schema)) => (plan, table_schema),
        _ => {
            let reason = validation
                .rejection_message(&table)
                .unwrap_or_else(|| format!("no schema for table {}", table));
            warn!(file = %path.display(), reason = %reason, "Skipping file");
            return FileOutcome::new(path, &table, FileStatus::Skipped { reason });
        }
    };

    if !plan.dropped.is_empty() {
        warn!(
            table = %table,
            columns = %plan.dropped.join(", "),
            "Dropping columns not in schema"
        );
    }

    let mut outcome = match insert_batch(conn, &batch, plan, table_schema) {
        Ok(inserted) => inserted.into_outcome(path, &table),
        Err(err) => {
            warn!(file = %path.display(), error = %err, "Skipping file");
            FileOutcome::new(
                path,
                &table,
                FileStatus::Failed {
                    reason: err.to_string(),
                },
            )
        }
    };
    outcome.dropped_columns = plan.dropped.clone();
    outcome
}

struct Inserted {
    rows: u64,
    row_count: Option<u64>,
    warning: Option<String>,
}

impl Inserted {
    fn into_outcome(self, path: &Path, table: &str) -> FileOutcome {
        let mut outcome = FileOutcome::new(
            path,
            table,
            FileStatus::Loaded {
                rows_inserted: self.rows,
                row_count: self.row_count,
            },
        );
        outcome.verification_warning = self.warning;
        outcome
    }
}

fn convert_rows(
    batch: &IngestBatch,
    plan: &ReconciliationPlan,
    table_schema: &TableSchema,
) -> std::result::Result<Vec<Vec<DbValue>>, IngestError> {
    let column_types: Vec<_> = plan
        .columns
        .iter()
        .map(|column| {
            table_schema
                .column_type(column)
                .unwrap_or(crate::types::ColumnType::Text)
        })
        .collect();

    batch
        .records
        .iter()
        .enumerate()
        .map(|(row_index, record)| {
            plan.project(record)
                .into_iter()
                .zip(&column_types)
                .zip(&plan.columns)
                .map(|((raw, column_type), column)| {
                    convert_cell(raw, *column_type).ok_or_else(|| IngestError::InvalidValue {
                        row: row_index + 1,
                        column: column.clone(),
                        value: raw.to_string(),
                        expected: column_type.sql_type(),
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()
        })
        .collect()
}

fn insert_batch(
    conn: &DbConnection,
    batch: &IngestBatch,
    plan: &ReconciliationPlan,
    table_schema: &TableSchema,
) -> std::result::Result<Inserted, IngestError> {
    let rows = convert_rows(batch, plan, table_schema)?;
    let table = batch.table.as_str();

    let before = conn.row_count(table);
    let columns = plan.column_refs();
    let inserted = conn
        .transaction(|tx| tx.bulk_insert_rows(table, &columns, &rows))
        .map_err(IngestError::Insert)?;
    info!(table = %table, rows = inserted, "Inserted rows");

    let (row_count, warning) = verify_row_count(table, before, inserted, conn.row_count(table));

    Ok(Inserted {
        rows: inserted,
        row_count,
        warning,
    })
}

/// Check the table's row count after an insert against the count before it.
///
/// Returns the count read back and a warning when it is lower than expected
/// or could not be read. Never fails the file.
fn verify_row_count<E: std::fmt::Display>(
    table: &str,
    before: std::result::Result<u64, E>,
    inserted: u64,
    after: std::result::Result<u64, E>,
) -> (Option<u64>, Option<String>) {
    match (before, after) {
        (Ok(before), Ok(after)) if after < before + inserted => {
            let expected = before + inserted;
            warn!(table = %table, expected, found = after, "Row count lower than expected");
            (
                Some(after),
                Some(format!(
                    "expected at least {} rows in {} after insert, found {}",
                    expected, table, after
                )),
            )
        }
        (Ok(_), Ok(after)) => (Some(after), None),
        (_, Err(err)) | (Err(err), Ok(_)) => {
            warn!(table = %table, error = %err, "Could not verify row count");
            (None, Some(format!("could not verify row count: {}", err)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn table_name_is_file_stem_verbatim() {
        assert_eq!(table_name_for(Path::new("/data/MEMBERS.csv")), "MEMBERS");
        assert_eq!(table_name_for(Path::new("Loans.CSV")), "Loans");
    }

    #[test]
    fn discovery_filters_extensions_and_schema_file() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "INFORMATION_SCHEMA.csv",
            "MEMBERS.csv",
            "ACCOUNTS.CSV",
            "LOANS.tsv",
            "notes.txt",
        ] {
            fs::write(tmp.path().join(name), "A\n1\n").unwrap();
        }
        fs::create_dir(tmp.path().join("nested.csv")).unwrap();

        let files = discover_data_files(tmp.path(), Some(OsStr::new("INFORMATION_SCHEMA.csv")))
            .unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ACCOUNTS.CSV", "LOANS.tsv", "MEMBERS.csv"]);
    }

    #[test]
    fn missing_directory_is_fatal() {
        let err = discover_data_files(Path::new("/no/such/dir"), None).unwrap_err();
        assert!(matches!(err, LoadError::DataDir { .. }));
    }

    #[test]
    fn batch_reads_tsv_with_tab_delimiter() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("LOANS.tsv");
        fs::write(&path, "ACCOUNT_GUID\tSTARTING_DEBT\na2\t50\n").unwrap();

        let batch = IngestBatch::read(&path).unwrap();
        assert_eq!(batch.table, "LOANS");
        assert_eq!(batch.columns, vec!["ACCOUNT_GUID", "STARTING_DEBT"]);
        assert_eq!(batch.len(), 1);
        assert_eq!(&batch.records[0][1], "50");
    }

    #[test]
    fn ragged_rows_are_a_csv_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("T.csv");
        fs::write(&path, "A,B\n1,2\n3\n").unwrap();

        assert!(matches!(IngestBatch::read(&path), Err(IngestError::Csv(_))));
    }

    #[test]
    fn row_count_matching_the_insert_has_no_warning() {
        assert_eq!(
            verify_row_count::<String>("T", Ok(2), 3, Ok(5)),
            (Some(5), None)
        );
        assert_eq!(
            verify_row_count::<String>("T", Ok(2), 3, Ok(6)),
            (Some(6), None)
        );
    }

    #[test]
    fn row_count_shortfall_is_a_warning() {
        let (row_count, warning) = verify_row_count::<String>("LOANS", Ok(2), 3, Ok(4));
        assert_eq!(row_count, Some(4));
        assert_eq!(
            warning.as_deref(),
            Some("expected at least 5 rows in LOANS after insert, found 4")
        );
    }

    #[test]
    fn unreadable_row_count_is_a_warning() {
        let (row_count, warning) =
            verify_row_count("LOANS", Ok(0), 1, Err("connection closed".to_string()));
        assert_eq!(row_count, None);
        assert_eq!(
            warning.as_deref(),
            Some("could not verify row count: connection closed")
        );

        let (row_count, warning) =
            verify_row_count("LOANS", Err("catalog busy".to_string()), 1, Ok(1));
        assert_eq!(row_count, None);
        assert!(warning.unwrap().contains("catalog busy"));
    }

    #[test]
    fn padded_headers_are_not_trimmed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("MEMBERS.csv");
        fs::write(&path, " MEMBER_GUID,NAME 
m1,Alice
").unwrap();

        let batch = IngestBatch::read(&path).unwrap();
        assert_eq!(batch.columns, vec![" MEMBER_GUID", "NAME "]);
    }

    #[test]
    fn summary_counts() {
        let summary = LoadSummary {
            files: vec![
                FileOutcome::new(
                    Path::new("A.csv"),
                    "A",
                    FileStatus::Loaded {
                        rows_inserted: 3,
                        row_count: Some(3),
                    },
                ),
                FileOutcome::new(
                    Path::new("B.csv"),
                    "B",
                    FileStatus::Skipped {
                        reason: "no schema for table B".to_string(),
                    },
                ),
                FileOutcome::new(
                    Path::new("C.csv"),
                    "C",
                    FileStatus::Failed {
                        reason: "Insert failed".to_string(),
                    },
                ),
            ],
        };

        assert_eq!(summary.loaded(), 1);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.rows_inserted(), 3);
        assert_eq!(summary.outcome_for("B").unwrap().rows_inserted(), 0);
    }
}
