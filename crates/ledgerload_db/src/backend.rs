//! DuckDB connection handle.
//!
//! Synchronous, single-connection access to an embedded DuckDB database.
//! Every statement runs inside a `debug_span` carrying the statement's
//! leading keyword, a stable SQL hash, and its duration.

use crate::error::BackendError;
use crate::value::{DbRow, DbValue, FromDbValue};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug_span, info};

/// URL prefix for DuckDB targets: `duckdb:<path>` or `duckdb::memory:`.
pub const DUCKDB_URL_PREFIX: &str = "duckdb:";
const MEMORY_PATH: &str = ":memory:";

/// Parameters per generated INSERT statement.
const DEFAULT_MAX_PARAMS: usize = 999;

/// Where a connection points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    File(PathBuf),
    Memory,
}

/// The store handle. Created once per run and passed by reference.
pub struct DbConnection {
    conn: duckdb::Connection,
    target: StoreTarget,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("backend", &"DuckDB")
            .field("target", &self.target)
            .finish()
    }
}

impl DbConnection {
    /// Open a database from a URL.
    ///
    /// Supported forms: `duckdb:<path>` and `duckdb::memory:`.
    pub fn open_from_url(url: &str) -> Result<Self, BackendError> {
        match parse_url(url)? {
            StoreTarget::Memory => Self::open_duckdb_memory(),
            StoreTarget::File(path) => Self::open_duckdb(&path),
        }
    }

    /// Open (or create) a DuckDB database file.
    pub fn open_duckdb(path: &Path) -> Result<Self, BackendError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = duckdb::Connection::open(path)?;
        info!("Opened DuckDB database: {}", path.display());

        Ok(Self {
            conn,
            target: StoreTarget::File(path.to_path_buf()),
        })
    }

    /// Open an in-memory DuckDB database (for testing).
    pub fn open_duckdb_memory() -> Result<Self, BackendError> {
        let conn = duckdb::Connection::open_in_memory()?;
        info!("Opened in-memory DuckDB database");

        Ok(Self {
            conn,
            target: StoreTarget::Memory,
        })
    }

    pub fn target(&self) -> &StoreTarget {
        &self.target
    }

    pub fn backend_name(&self) -> &'static str {
        "DuckDB"
    }

    /// Execute a SQL statement (no results).
    pub fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        execute_on_conn(&self.conn, sql, params)
    }

    /// Execute a batch of SQL statements.
    pub fn execute_batch(&self, sql: &str) -> Result<(), BackendError> {
        execute_batch_on_conn(&self.conn, sql)
    }

    /// Bulk insert rows into a table.
    ///
    /// Column order must match the row value order.
    pub fn bulk_insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<DbValue>],
    ) -> Result<u64, BackendError> {
        bulk_insert_rows_internal(
            |sql, params| execute_on_conn(&self.conn, sql, params),
            table,
            columns,
            rows,
        )
    }

    /// Query and return all rows.
    pub fn query_all(&self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        query_on_conn(&self.conn, sql, params)
    }

    /// Query and return the first row, if any.
    pub fn query_optional(
        &self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<Option<DbRow>, BackendError> {
        let rows = self.query_all(sql, params)?;
        Ok(rows.into_iter().next())
    }

    /// Query and return exactly one row.
    pub fn query_one(&self, sql: &str, params: &[DbValue]) -> Result<DbRow, BackendError> {
        self.query_optional(sql, params)?
            .ok_or_else(|| BackendError::Query("Expected one row, got none".to_string()))
    }

    /// Query and return a single scalar value.
    pub fn query_scalar<T: FromDbValue>(
        &self,
        sql: &str,
        params: &[DbValue],
    ) -> Result<T, BackendError> {
        let row = self.query_one(sql, params)?;
        row.get(0)
    }

    /// Run `op` inside BEGIN/COMMIT, rolling back when it fails.
    pub fn transaction<T, F>(&self, op: F) -> Result<T, BackendError>
    where
        F: for<'a> FnOnce(&'a mut DbTransaction<'a>) -> Result<T, BackendError>,
    {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        let mut tx = DbTransaction { conn: &self.conn };
        let result = op(&mut tx);

        match result {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => match self.conn.execute_batch("ROLLBACK") {
                Ok(()) => Err(err),
                Err(rollback_err) => Err(BackendError::Transaction(format!(
                    "Transaction failed: {}; rollback failed: {}",
                    err, rollback_err
                ))),
            },
        }
    }

    /// Whether a table with this name exists in the main schema.
    ///
    /// DuckDB resolves identifiers case-insensitively, so the lookup does too.
    pub fn table_exists(&self, table: &str) -> Result<bool, BackendError> {
        let count: i64 = self.query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = 'main' AND lower(table_name) = lower(?)",
            &[DbValue::from(table)],
        )?;
        Ok(count > 0)
    }

    /// Column names of a table in declared order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>, BackendError> {
        let rows = self.query_all(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = 'main' AND lower(table_name) = lower(?) \
             ORDER BY ordinal_position",
            &[DbValue::from(table)],
        )?;
        rows.iter().map(|row| row.get::<String>(0)).collect()
    }

    /// `SELECT COUNT(*)` for a table.
    pub fn row_count(&self, table: &str) -> Result<u64, BackendError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.query_scalar(&sql, &[])?;
        Ok(count.max(0) as u64)
    }
}

/// Transaction scope handed to [`DbConnection::transaction`].
pub struct DbTransaction<'a> {
    conn: &'a duckdb::Connection,
}

impl<'a> DbTransaction<'a> {
    pub fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64, BackendError> {
        execute_on_conn(self.conn, sql, params)
    }

    pub fn execute_batch(&mut self, sql: &str) -> Result<(), BackendError> {
        execute_batch_on_conn(self.conn, sql)
    }

    pub fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        query_on_conn(self.conn, sql, params)
    }

    /// Bulk insert rows into a table within this transaction.
    ///
    /// Column order must match the row value order.
    pub fn bulk_insert_rows(
        &mut self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<DbValue>],
    ) -> Result<u64, BackendError> {
        let conn = self.conn;
        bulk_insert_rows_internal(
            |sql, params| execute_on_conn(conn, sql, params),
            table,
            columns,
            rows,
        )
    }
}

fn execute_on_conn(
    conn: &duckdb::Connection,
    sql: &str,
    params: &[DbValue],
) -> Result<u64, BackendError> {
    let op = sql_op_name(sql);
    let sql_hash = hash_sql(sql);
    let span = debug_span!(
        "db.exec",
        op = op,
        sql_hash = %sql_hash,
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let start = Instant::now();

    let mut stmt = conn.prepare(sql)?;
    let duckdb_params = to_duckdb_params(params);
    let param_refs: Vec<&dyn duckdb::ToSql> = duckdb_params
        .iter()
        .map(|v| v as &dyn duckdb::ToSql)
        .collect();
    let rows = stmt.execute(param_refs.as_slice())?;
    span.record("duration_ms", start.elapsed().as_millis() as u64);
    Ok(rows as u64)
}

fn execute_batch_on_conn(conn: &duckdb::Connection, sql: &str) -> Result<(), BackendError> {
    let sql_hash = hash_sql(sql);
    let span = debug_span!(
        "db.exec_batch",
        op = "BATCH",
        sql_hash = %sql_hash,
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let start = Instant::now();
    conn.execute_batch(sql)?;
    span.record("duration_ms", start.elapsed().as_millis() as u64);
    Ok(())
}

fn query_on_conn(
    conn: &duckdb::Connection,
    sql: &str,
    params: &[DbValue],
) -> Result<Vec<DbRow>, BackendError> {
    let op = sql_op_name(sql);
    let sql_hash = hash_sql(sql);
    let span = debug_span!(
        "db.query",
        op = op,
        sql_hash = %sql_hash,
        duration_ms = tracing::field::Empty
    );
    let _guard = span.enter();
    let start = Instant::now();

    let mut stmt = conn.prepare(sql)?;
    let duckdb_params = to_duckdb_params(params);
    let param_refs: Vec<&dyn duckdb::ToSql> = duckdb_params
        .iter()
        .map(|v| v as &dyn duckdb::ToSql)
        .collect();

    let mut rows_iter = stmt.query(param_refs.as_slice())?;

    let (column_count, columns) = if let Some(stmt_ref) = rows_iter.as_ref() {
        let count = stmt_ref.column_count();
        let cols: Vec<String> = (0..count)
            .map(|i| {
                stmt_ref
                    .column_name(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect();
        (count, cols)
    } else {
        return Ok(Vec::new());
    };

    let mut result = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(duckdb_value_to_db_value(row, i)?);
        }
        result.push(DbRow::new(columns.clone(), values));
    }

    span.record("duration_ms", start.elapsed().as_millis() as u64);
    Ok(result)
}

/// Decimals, dates and timestamps are bound as their canonical text form and
/// cast by DuckDB to the target column type.
fn to_duckdb_params(params: &[DbValue]) -> Vec<duckdb::types::Value> {
    use duckdb::types::Value;

    params
        .iter()
        .map(|p| match p {
            DbValue::Null => Value::Null,
            DbValue::Integer(v) => Value::BigInt(*v),
            DbValue::Real(v) => Value::Double(*v),
            DbValue::Decimal(v) => Value::Text(v.to_string()),
            DbValue::Text(v) => Value::Text(v.clone()),
            DbValue::Boolean(v) => Value::Boolean(*v),
            DbValue::Date(v) => Value::Text(v.format("%Y-%m-%d").to_string()),
            DbValue::Timestamp(v) => Value::Text(v.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        })
        .collect()
}

fn to_micros(unit: duckdb::types::TimeUnit, v: i64) -> i64 {
    use duckdb::types::TimeUnit;

    match unit {
        TimeUnit::Second => v * 1_000_000,
        TimeUnit::Millisecond => v * 1_000,
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

fn duckdb_value_to_db_value(row: &duckdb::Row, index: usize) -> Result<DbValue, duckdb::Error> {
    use duckdb::types::ValueRef;

    match row.get_ref(index)? {
        ValueRef::Null => Ok(DbValue::Null),
        ValueRef::Boolean(v) => Ok(DbValue::Boolean(v)),
        ValueRef::TinyInt(v) => Ok(DbValue::Integer(v as i64)),
        ValueRef::SmallInt(v) => Ok(DbValue::Integer(v as i64)),
        ValueRef::Int(v) => Ok(DbValue::Integer(v as i64)),
        ValueRef::BigInt(v) => Ok(DbValue::Integer(v)),
        ValueRef::HugeInt(v) => match i64::try_from(v) {
            Ok(v) => Ok(DbValue::Integer(v)),
            Err(_) => Ok(DbValue::Text(v.to_string())),
        },
        ValueRef::UTinyInt(v) => Ok(DbValue::Integer(v as i64)),
        ValueRef::USmallInt(v) => Ok(DbValue::Integer(v as i64)),
        ValueRef::UInt(v) => Ok(DbValue::Integer(v as i64)),
        ValueRef::UBigInt(v) => match i64::try_from(v) {
            Ok(v) => Ok(DbValue::Integer(v)),
            Err(_) => Ok(DbValue::Text(v.to_string())),
        },
        ValueRef::Float(v) => Ok(DbValue::Real(v as f64)),
        ValueRef::Double(v) => Ok(DbValue::Real(v)),
        ValueRef::Decimal(v) => Ok(DbValue::Decimal(v)),
        ValueRef::Text(v) => Ok(DbValue::Text(String::from_utf8_lossy(v).to_string())),
        ValueRef::Timestamp(unit, v) => {
            let micros = to_micros(unit, v);
            let secs = micros.div_euclid(1_000_000);
            let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
            match chrono::DateTime::from_timestamp(secs, nanos) {
                Some(dt) => Ok(DbValue::Timestamp(dt.naive_utc())),
                None => Ok(DbValue::Integer(micros)),
            }
        }
        ValueRef::Date32(days) => match NaiveDate::from_num_days_from_ce_opt(719_163 + days) {
            Some(date) => Ok(DbValue::Date(date)),
            None => Ok(DbValue::Integer(days as i64)),
        },
        other => {
            tracing::warn!(
                "DuckDB type {:?} at column {} mapped to debug string",
                std::mem::discriminant(&other),
                index
            );
            Ok(DbValue::Text(format!("{:?}", other)))
        }
    }
}

fn bulk_insert_rows_internal<F>(
    mut execute: F,
    table: &str,
    columns: &[&str],
    rows: &[Vec<DbValue>],
) -> Result<u64, BackendError>
where
    F: FnMut(&str, &[DbValue]) -> Result<u64, BackendError>,
{
    if rows.is_empty() {
        return Ok(0);
    }
    if columns.is_empty() {
        return Err(BackendError::InvalidInput(
            "bulk_insert_rows requires at least one column".to_string(),
        ));
    }

    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(BackendError::InvalidInput(format!(
                "Row {} has {} values, expected {}",
                index,
                row.len(),
                columns.len()
            )));
        }
    }

    let cols_len = columns.len();
    if cols_len > DEFAULT_MAX_PARAMS {
        return Err(BackendError::InvalidInput(format!(
            "Too many columns ({}) for max params ({})",
            cols_len, DEFAULT_MAX_PARAMS
        )));
    }
    let rows_per_chunk = DEFAULT_MAX_PARAMS / cols_len;

    let quoted_table = quote_ident(table);
    let quoted_cols = columns
        .iter()
        .map(|col| quote_ident(col))
        .collect::<Vec<_>>()
        .join(", ");
    let row_clause = format!("({})", vec!["?"; cols_len].join(", "));

    let mut total = 0;
    for chunk in rows.chunks(rows_per_chunk) {
        let values_clause = std::iter::repeat(row_clause.as_str())
            .take(chunk.len())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quoted_table, quoted_cols, values_clause
        );
        let params: Vec<DbValue> = chunk.iter().flatten().cloned().collect();
        execute(&sql, &params)?;
        total += chunk.len() as u64;
    }

    Ok(total)
}

/// Quote an identifier for DuckDB, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push('"');
    for ch in name.chars() {
        if ch == '"' {
            escaped.push('"');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    escaped
}

/// Resolve a connection URL into a target without opening it.
pub fn parse_url(url: &str) -> Result<StoreTarget, BackendError> {
    let url = url.trim();
    let rest = url.strip_prefix(DUCKDB_URL_PREFIX).ok_or_else(|| {
        BackendError::NotAvailable(format!(
            "Unsupported database URL: '{}' (expected duckdb:<path> or duckdb::memory:)",
            url
        ))
    })?;

    match rest {
        "" => Err(BackendError::NotAvailable(format!(
            "Database URL has no path: '{}'",
            url
        ))),
        MEMORY_PATH => Ok(StoreTarget::Memory),
        path => Ok(StoreTarget::File(PathBuf::from(path))),
    }
}

fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

fn hash_sql(sql: &str) -> String {
    // FNV-1a 64-bit
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in sql.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    format!("{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_insert_rows_inserts_expected_rows() {
        let conn = DbConnection::open_duckdb_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id BIGINT, name TEXT)")
            .unwrap();

        let rows = vec![
            vec![DbValue::from(1_i64), DbValue::from("alpha")],
            vec![DbValue::from(2_i64), DbValue::from("beta")],
        ];
        let inserted = conn.bulk_insert_rows("t", &["id", "name"], &rows).unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(conn.row_count("t").unwrap(), 2);
    }

    #[test]
    fn bulk_insert_rows_rejects_mismatched_row_len() {
        let conn = DbConnection::open_duckdb_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id BIGINT, name TEXT)")
            .unwrap();

        let rows = vec![
            vec![DbValue::from(1_i64)],
            vec![DbValue::from(2_i64), DbValue::from("beta")],
        ];
        let err = conn
            .bulk_insert_rows("t", &["id", "name"], &rows)
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidInput(_)));
    }

    #[test]
    fn bulk_insert_rows_empty_is_noop() {
        let conn = DbConnection::open_duckdb_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id BIGINT)").unwrap();

        let inserted = conn.bulk_insert_rows("t", &["id"], &[]).unwrap();
        assert_eq!(inserted, 0);
    }

    #[test]
    fn bulk_insert_splits_large_batches_into_chunks() {
        let conn = DbConnection::open_duckdb_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a BIGINT, b BIGINT)")
            .unwrap();

        let rows: Vec<Vec<DbValue>> = (0..1_200_i64)
            .map(|i| vec![DbValue::from(i), DbValue::from(i * 2)])
            .collect();
        let inserted = conn.bulk_insert_rows("t", &["a", "b"], &rows).unwrap();

        assert_eq!(inserted, 1_200);
        assert_eq!(conn.row_count("t").unwrap(), 1_200);
    }

    #[test]
    fn parse_url_accepts_file_and_memory_targets() {
        assert_eq!(parse_url("duckdb::memory:").unwrap(), StoreTarget::Memory);
        assert_eq!(
            parse_url("duckdb:/tmp/ledger.duckdb").unwrap(),
            StoreTarget::File(PathBuf::from("/tmp/ledger.duckdb"))
        );
        assert!(matches!(
            parse_url("postgres://localhost/db"),
            Err(BackendError::NotAvailable(_))
        ));
        assert!(matches!(
            parse_url("duckdb:"),
            Err(BackendError::NotAvailable(_))
        ));
    }

    #[test]
    fn quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident("MEMBERS"), "\"MEMBERS\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
