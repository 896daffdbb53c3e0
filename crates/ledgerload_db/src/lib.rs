//! Store access layer for ledgerload.
//!
//! Every read and write of the relational store goes through [`DbConnection`].
//! The handle is opened once per run by whoever orchestrates it and then
//! passed by reference; there is no process-wide connection.
//!
//! # Usage
//!
//! ```rust,ignore
//! use ledgerload_db::{DbConnection, DbValue};
//!
//! let db = DbConnection::open_from_url("duckdb:./ledger.duckdb")?;
//! db.execute_batch("CREATE TABLE t (id BIGINT)")?;
//! db.bulk_insert_rows("t", &["id"], &[vec![DbValue::from(1_i64)]])?;
//! assert_eq!(db.row_count("t")?, 1);
//! ```

mod backend;
mod error;
mod value;

pub use backend::{parse_url, quote_ident, DbConnection, DbTransaction, StoreTarget, DUCKDB_URL_PREFIX};
pub use error::BackendError;
pub use value::{DbRow, DbValue, FromDbValue};

pub use rust_decimal::Decimal;
