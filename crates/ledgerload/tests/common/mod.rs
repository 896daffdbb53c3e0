//! Fixture data shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const FINANCIAL_SCHEMA: &str = "\
TABLE_NAME,COLUMN_NAME,DATA_TYPE
MEMBERS,MEMBER_GUID,varchar
MEMBERS,FIRST_NAME,varchar
MEMBERS,LAST_NAME,varchar
ACCOUNTS,ACCOUNT_GUID,varchar
ACCOUNTS,MEMBER_GUID,varchar
CHECKING,ACCOUNT_GUID,varchar
CHECKING,STARTING_BALANCE,numeric
LOANS,ACCOUNT_GUID,varchar
LOANS,STARTING_DEBT,numeric
TRANSACTIONS,ACCOUNT_GUID,varchar
TRANSACTIONS,TRANSACTION_AMOUNT,numeric
";

/// One member with an overdrawn checking account (a1) and an overpaid loan (a2).
pub fn write_financial_fixture(dir: &Path) -> PathBuf {
    let schema = dir.join("INFORMATION_SCHEMA.csv");
    fs::write(&schema, FINANCIAL_SCHEMA).unwrap();
    fs::write(
        dir.join("MEMBERS.csv"),
        "MEMBER_GUID,FIRST_NAME,LAST_NAME\nm1,Alice,Smith\n",
    )
    .unwrap();
    fs::write(
        dir.join("ACCOUNTS.csv"),
        "ACCOUNT_GUID,MEMBER_GUID\na1,m1\na2,m1\n",
    )
    .unwrap();
    fs::write(
        dir.join("CHECKING.csv"),
        "ACCOUNT_GUID,STARTING_BALANCE\na1,-100\n",
    )
    .unwrap();
    fs::write(dir.join("LOANS.csv"), "ACCOUNT_GUID,STARTING_DEBT\na2,50\n").unwrap();
    fs::write(
        dir.join("TRANSACTIONS.csv"),
        "ACCOUNT_GUID,TRANSACTION_AMOUNT\na1,0\na2,100\n",
    )
    .unwrap();
    schema
}
