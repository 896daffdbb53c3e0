//! `ledgerload load`: rebuild tables and load every data file.

use crate::cli::error::HelpfulError;
use crate::cli::output::format_number;
use ledgerload::loader::{FileOutcome, FileStatus, LoadSummary};
use ledgerload::{config, loader};
use std::path::{Path, PathBuf};

/// Arguments for the load command
#[derive(Debug)]
pub struct LoadArgs<'a> {
    pub database_url: Option<&'a str>,
    pub schema: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub json: bool,
}

/// Resolve the data directory and schema path, filling in defaults.
///
/// Without `--schema`, the schema lives in the data directory.
pub fn resolve_paths(schema: Option<PathBuf>, data_dir: Option<PathBuf>) -> (PathBuf, PathBuf) {
    let data_dir = data_dir.unwrap_or_else(config::default_data_dir);
    let schema = schema.unwrap_or_else(|| config::schema_path_in(&data_dir));
    (schema, data_dir)
}

pub fn run(args: LoadArgs<'_>) -> anyhow::Result<()> {
    let (schema_path, data_dir) = resolve_paths(args.schema, args.data_dir);
    let conn = config::connect(args.database_url).map_err(HelpfulError::from)?;

    if !args.json {
        println!("Using schema: {}", schema_path.display());
        println!("Loading CSVs from: {}", data_dir.display());
    }

    let summary =
        loader::run_load(&conn, &schema_path, &data_dir).map_err(HelpfulError::from)?;

    if args.json {
        print_json(&schema_path, &data_dir, &summary)?;
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_json(schema_path: &Path, data_dir: &Path, summary: &LoadSummary) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "schema": schema_path.to_string_lossy(),
        "data_dir": data_dir.to_string_lossy(),
        "loaded": summary.loaded(),
        "skipped": summary.skipped(),
        "failed": summary.failed(),
        "rows_inserted": summary.rows_inserted(),
        "files": summary.files,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn file_name(outcome: &FileOutcome) -> String {
    outcome
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| outcome.file.display().to_string())
}

/// One line describing a file's outcome.
pub fn describe(outcome: &FileOutcome) -> String {
    let name = file_name(outcome);
    match &outcome.status {
        FileStatus::Loaded { rows_inserted, .. } => format!(
            "  {} -> {}: loaded {} row{}",
            name,
            outcome.table,
            format_number(*rows_inserted),
            if *rows_inserted == 1 { "" } else { "s" }
        ),
        FileStatus::Skipped { reason } => format!("  {}: skipped ({})", name, reason),
        FileStatus::Failed { reason } => format!("  {}: failed ({})", name, reason),
    }
}

fn print_summary(summary: &LoadSummary) {
    if summary.files.is_empty() {
        println!("No data files found.");
    }

    for outcome in &summary.files {
        println!("{}", describe(outcome));
        if !outcome.dropped_columns.is_empty() {
            println!(
                "    dropped columns not in schema: {}",
                outcome.dropped_columns.join(", ")
            );
        }
        if let Some(warning) = &outcome.verification_warning {
            println!("    warning: {}", warning);
        }
    }

    println!();
    println!(
        "Loaded {} file(s), skipped {}, failed {}; {} row(s) inserted.",
        summary.loaded(),
        summary.skipped(),
        summary.failed(),
        format_number(summary.rows_inserted())
    );
}
