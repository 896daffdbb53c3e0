//! Configuration paths and store connection resolution.
//!
//! Everything here is resolved lazily: a missing `DATABASE_URL` only becomes
//! an error when a command actually needs the store.

use crate::error::{LoadError, Result};
use ledgerload_db::DbConnection;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding the store connection URL.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Environment variable relocating the ledgerload home directory.
pub const HOME_ENV: &str = "LEDGERLOAD_HOME";

/// File name of the schema description inside a data directory.
pub const SCHEMA_FILE_NAME: &str = "INFORMATION_SCHEMA.csv";

/// Default data directory: `./data`.
pub fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Schema description path for a data directory.
pub fn schema_path_in(data_dir: &Path) -> PathBuf {
    data_dir.join(SCHEMA_FILE_NAME)
}

/// Default schema description: `./data/INFORMATION_SCHEMA.csv`.
pub fn default_schema_path() -> PathBuf {
    schema_path_in(&default_data_dir())
}

/// Resolve the ledgerload home directory.
///
/// Priority:
/// 1) LEDGERLOAD_HOME
/// 2) ~/.ledgerload
/// 3) ./.ledgerload
pub fn ledgerload_home() -> PathBuf {
    if let Some(path) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".ledgerload"),
        None => PathBuf::from(".").join(".ledgerload"),
    }
}

/// Log directory: `<home>/logs`.
pub fn logs_dir() -> PathBuf {
    ledgerload_home().join("logs")
}

/// Pick the connection URL: an explicit value wins over `DATABASE_URL`.
///
/// Blank values count as absent.
pub fn resolve_database_url(explicit: Option<&str>) -> Result<String> {
    let from_env = std::env::var(DATABASE_URL_ENV).ok();
    explicit
        .map(str::to_string)
        .or(from_env)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            LoadError::configuration(format!("{} is not set", DATABASE_URL_ENV))
        })
}

/// Open the store named by `url`. Any failure is a configuration error.
pub fn open_store(url: &str) -> Result<DbConnection> {
    let conn = DbConnection::open_from_url(url)
        .map_err(|err| LoadError::configuration(format!("cannot open store '{}': {}", url, err)))?;
    debug!(target_store = ?conn.target(), "Store opened");
    Ok(conn)
}

/// Resolve the URL, then open the store.
pub fn connect(explicit: Option<&str>) -> Result<DbConnection> {
    let url = resolve_database_url(explicit)?;
    open_store(&url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths() {
        assert_eq!(default_data_dir(), PathBuf::from("data"));
        assert_eq!(
            default_schema_path(),
            PathBuf::from("data").join("INFORMATION_SCHEMA.csv")
        );
    }

    #[test]
    fn explicit_url_wins() {
        assert_eq!(
            resolve_database_url(Some(" duckdb::memory: ")).unwrap(),
            "duckdb::memory:"
        );
    }

    #[test]
    fn unsupported_url_is_a_configuration_error() {
        let err = open_store("postgres://localhost/ledger").unwrap_err();
        assert!(matches!(err, LoadError::Configuration(_)));
    }

    #[test]
    fn memory_url_opens() {
        let conn = open_store("duckdb::memory:").unwrap();
        assert_eq!(conn.backend_name(), "DuckDB");
    }
}
