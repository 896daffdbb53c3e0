//! ledgerload - load member account CSVs into DuckDB and report on them
//!
//! Usage:
//!   ledgerload load [--schema PATH] [--data-dir DIR] [--json]
//!   ledgerload run-queries [--json]
//!   ledgerload config [--json]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

mod cli;
mod logging;

#[derive(Parser, Debug)]
#[command(
    name = "ledgerload",
    version,
    about = "Schema-driven CSV loader and account reports"
)]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Store connection URL (duckdb:<path> or duckdb::memory:)
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recreate the described tables and load every data file
    Load {
        /// Schema description CSV [default: <data-dir>/INFORMATION_SCHEMA.csv]
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Directory holding the data files [default: ./data]
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Print the load summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print overdrawn accounts, overpaid loans and total assets
    RunQueries {
        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show resolved paths and connection settings
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    let database_url = cli.database_url.as_deref();
    match cli.command {
        Commands::Load {
            schema,
            data_dir,
            json,
        } => cli::load::run(cli::load::LoadArgs {
            database_url,
            schema,
            data_dir,
            json,
        }),
        Commands::RunQueries { json } => {
            cli::queries::run(cli::queries::QueryArgs { database_url, json })
        }
        Commands::Config { json } => cli::config::run(cli::config::ConfigArgs {
            database_url,
            json,
        }),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose);

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("{}", cli::error::render(&err));
            ExitCode::from(1)
        }
    }
}
