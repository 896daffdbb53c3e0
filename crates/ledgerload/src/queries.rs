//! Canned financial reports over the loaded tables.
//!
//! Balances follow the institution's conventions: a checking account's
//! balance is its starting balance plus its transaction amounts, a loan's
//! remaining debt is its starting debt minus its transaction amounts. An
//! account without transactions keeps its starting value.

use crate::error::QueryError;
use ledgerload_db::{DbConnection, DbRow, Decimal};
use serde::Serialize;
use tracing::{debug, info};

/// Tables the reports join over.
pub const REQUIRED_TABLES: [&str; 5] = ["CHECKING", "LOANS", "ACCOUNTS", "MEMBERS", "TRANSACTIONS"];

const OVERDRAWN_SQL: &str = r#"
SELECT
    m."MEMBER_GUID",
    m."FIRST_NAME",
    m."LAST_NAME",
    c."ACCOUNT_GUID",
    CAST(c."STARTING_BALANCE" + COALESCE(SUM(t."TRANSACTION_AMOUNT"), 0) AS VARCHAR) AS balance
FROM "CHECKING" c
JOIN "ACCOUNTS" a ON c."ACCOUNT_GUID" = a."ACCOUNT_GUID"
JOIN "MEMBERS" m ON a."MEMBER_GUID" = m."MEMBER_GUID"
LEFT JOIN "TRANSACTIONS" t ON c."ACCOUNT_GUID" = t."ACCOUNT_GUID"
GROUP BY m."MEMBER_GUID", m."FIRST_NAME", m."LAST_NAME", c."ACCOUNT_GUID", c."STARTING_BALANCE"
HAVING c."STARTING_BALANCE" + COALESCE(SUM(t."TRANSACTION_AMOUNT"), 0) < 0
ORDER BY m."MEMBER_GUID", c."ACCOUNT_GUID"
"#;

const OVERPAID_SQL: &str = r#"
SELECT
    m."MEMBER_GUID",
    m."FIRST_NAME",
    m."LAST_NAME",
    l."ACCOUNT_GUID",
    CAST(COALESCE(SUM(t."TRANSACTION_AMOUNT"), 0) - l."STARTING_DEBT" AS VARCHAR) AS overpaid_amount
FROM "LOANS" l
JOIN "ACCOUNTS" a ON l."ACCOUNT_GUID" = a."ACCOUNT_GUID"
JOIN "MEMBERS" m ON a."MEMBER_GUID" = m."MEMBER_GUID"
LEFT JOIN "TRANSACTIONS" t ON l."ACCOUNT_GUID" = t."ACCOUNT_GUID"
GROUP BY m."MEMBER_GUID", m."FIRST_NAME", m."LAST_NAME", l."ACCOUNT_GUID", l."STARTING_DEBT"
HAVING COALESCE(SUM(t."TRANSACTION_AMOUNT"), 0) > l."STARTING_DEBT"
ORDER BY m."MEMBER_GUID", l."ACCOUNT_GUID"
"#;

const TOTAL_ASSETS_SQL: &str = r#"
WITH checking_balances AS (
    SELECT
        c."ACCOUNT_GUID",
        c."STARTING_BALANCE" + COALESCE(SUM(t."TRANSACTION_AMOUNT"), 0) AS balance
    FROM "CHECKING" c
    LEFT JOIN "TRANSACTIONS" t ON c."ACCOUNT_GUID" = t."ACCOUNT_GUID"
    GROUP BY c."ACCOUNT_GUID", c."STARTING_BALANCE"
),
loan_balances AS (
    SELECT
        l."ACCOUNT_GUID",
        l."STARTING_DEBT" - COALESCE(SUM(t."TRANSACTION_AMOUNT"), 0) AS remaining_debt
    FROM "LOANS" l
    LEFT JOIN "TRANSACTIONS" t ON l."ACCOUNT_GUID" = t."ACCOUNT_GUID"
    GROUP BY l."ACCOUNT_GUID", l."STARTING_DEBT"
)
SELECT CAST(
    COALESCE((SELECT SUM(balance) FROM checking_balances), 0)
    - COALESCE((SELECT SUM(remaining_debt) FROM loan_balances), 0)
    AS VARCHAR) AS total_assets
"#;

/// A checking account whose current balance is below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdrawnAccount {
    pub member_guid: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub account_guid: String,
    pub balance: Decimal,
}

/// A loan whose payments exceed its starting debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverpaidLoan {
    pub member_guid: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub account_guid: String,
    pub overpaid_amount: Decimal,
}

/// All three reports from one store, as printed by `run-queries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryReport {
    pub overdrawn_checking_accounts: Vec<OverdrawnAccount>,
    pub overpaid_loans: Vec<OverpaidLoan>,
    pub total_assets: Decimal,
}

/// Fail with [`QueryError::TablesMissing`] unless every report table exists.
pub fn ensure_tables(conn: &DbConnection) -> Result<(), QueryError> {
    let mut missing = Vec::new();
    for table in REQUIRED_TABLES {
        if !conn.table_exists(table)? {
            missing.push(table.to_string());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        debug!(missing = %missing.join(", "), "Report tables missing");
        Err(QueryError::TablesMissing(missing))
    }
}

fn member_columns(row: &DbRow) -> Result<(String, Option<String>, Option<String>, String), QueryError> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// Amounts are selected as text; a sum wider than a `Decimal` is a
/// conversion error rather than a lossy read.
fn amount(row: &DbRow, index: usize) -> Result<Decimal, QueryError> {
    Ok(row.get::<Decimal>(index)?.normalize())
}

/// Checking accounts with a negative balance, ordered by member then account.
pub fn overdrawn_checking_accounts(conn: &DbConnection) -> Result<Vec<OverdrawnAccount>, QueryError> {
    ensure_tables(conn)?;
    let rows = conn.query_all(OVERDRAWN_SQL, &[])?;
    let accounts = rows
        .iter()
        .map(|row| {
            let (member_guid, first_name, last_name, account_guid) = member_columns(row)?;
            Ok(OverdrawnAccount {
                member_guid,
                first_name,
                last_name,
                account_guid,
                balance: amount(row, 4)?,
            })
        })
        .collect::<Result<Vec<_>, QueryError>>()?;
    info!(rows = accounts.len(), "Overdrawn checking accounts");
    Ok(accounts)
}

/// Loans paid beyond their starting debt, ordered by member then account.
pub fn overpaid_loans(conn: &DbConnection) -> Result<Vec<OverpaidLoan>, QueryError> {
    ensure_tables(conn)?;
    let rows = conn.query_all(OVERPAID_SQL, &[])?;
    let loans = rows
        .iter()
        .map(|row| {
            let (member_guid, first_name, last_name, account_guid) = member_columns(row)?;
            Ok(OverpaidLoan {
                member_guid,
                first_name,
                last_name,
                account_guid,
                overpaid_amount: amount(row, 4)?,
            })
        })
        .collect::<Result<Vec<_>, QueryError>>()?;
    info!(rows = loans.len(), "Overpaid loans");
    Ok(loans)
}

/// Sum of checking balances minus sum of remaining loan debts.
pub fn total_assets(conn: &DbConnection) -> Result<Decimal, QueryError> {
    ensure_tables(conn)?;
    let total = conn.query_scalar::<Decimal>(TOTAL_ASSETS_SQL, &[])?.normalize();
    info!(total = %total, "Total assets");
    Ok(total)
}

/// Run every report.
pub fn run_all(conn: &DbConnection) -> Result<QueryReport, QueryError> {
    Ok(QueryReport {
        overdrawn_checking_accounts: overdrawn_checking_accounts(conn)?,
        overpaid_loans: overpaid_loans(conn)?,
        total_assets: total_assets(conn)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_reports_every_missing_table() {
        let conn = DbConnection::open_duckdb_memory().unwrap();
        match total_assets(&conn).unwrap_err() {
            QueryError::TablesMissing(missing) => assert_eq!(missing.len(), REQUIRED_TABLES.len()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn partial_store_names_only_absent_tables() {
        let conn = DbConnection::open_duckdb_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE \"MEMBERS\" (\"MEMBER_GUID\" VARCHAR); \
             CREATE TABLE \"ACCOUNTS\" (\"ACCOUNT_GUID\" VARCHAR)",
        )
        .unwrap();

        let err = overpaid_loans(&conn).unwrap_err();
        assert!(err.is_tables_missing());
        match err {
            QueryError::TablesMissing(missing) => {
                assert_eq!(missing, vec!["CHECKING", "LOANS", "TRANSACTIONS"])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_tables_total_zero() {
        let conn = DbConnection::open_duckdb_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE \"MEMBERS\" (\"MEMBER_GUID\" VARCHAR, \"FIRST_NAME\" VARCHAR, \"LAST_NAME\" VARCHAR); \
             CREATE TABLE \"ACCOUNTS\" (\"ACCOUNT_GUID\" VARCHAR, \"MEMBER_GUID\" VARCHAR); \
             CREATE TABLE \"CHECKING\" (\"ACCOUNT_GUID\" VARCHAR, \"STARTING_BALANCE\" DECIMAL(38,2)); \
             CREATE TABLE \"LOANS\" (\"ACCOUNT_GUID\" VARCHAR, \"STARTING_DEBT\" DECIMAL(38,2)); \
             CREATE TABLE \"TRANSACTIONS\" (\"ACCOUNT_GUID\" VARCHAR, \"TRANSACTION_AMOUNT\" DECIMAL(38,2))",
        )
        .unwrap();

        let report = run_all(&conn).unwrap();
        assert!(report.overdrawn_checking_accounts.is_empty());
        assert!(report.overpaid_loans.is_empty());
        assert_eq!(report.total_assets, Decimal::ZERO);
    }

    #[test]
    fn sum_wider_than_decimal_is_a_database_error() {
        let conn = DbConnection::open_duckdb_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE \"MEMBERS\" (\"MEMBER_GUID\" VARCHAR, \"FIRST_NAME\" VARCHAR, \"LAST_NAME\" VARCHAR); \
             CREATE TABLE \"ACCOUNTS\" (\"ACCOUNT_GUID\" VARCHAR, \"MEMBER_GUID\" VARCHAR); \
             CREATE TABLE \"CHECKING\" (\"ACCOUNT_GUID\" VARCHAR, \"STARTING_BALANCE\" DECIMAL(38,2)); \
             CREATE TABLE \"LOANS\" (\"ACCOUNT_GUID\" VARCHAR, \"STARTING_DEBT\" DECIMAL(38,2)); \
             CREATE TABLE \"TRANSACTIONS\" (\"ACCOUNT_GUID\" VARCHAR, \"TRANSACTION_AMOUNT\" DECIMAL(38,2)); \
             INSERT INTO \"CHECKING\" VALUES ('a1', 123456789012345678901234567890.12)",
        )
        .unwrap();

        assert!(overdrawn_checking_accounts(&conn).unwrap().is_empty());
        assert!(matches!(
            total_assets(&conn),
            Err(QueryError::Database(_))
        ));
    }
}
