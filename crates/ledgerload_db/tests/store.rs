use ledgerload_db::{BackendError, DbConnection, DbValue, Decimal};
use tempfile::TempDir;

#[test]
fn test_open_from_url_creates_database_file() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("nested").join("ledger.duckdb");
    let url = format!("duckdb:{}", db_path.display());

    let db = DbConnection::open_from_url(&url).unwrap();
    db.execute_batch("CREATE TABLE t (id BIGINT)").unwrap();
    drop(db);

    assert!(db_path.exists());
}

#[test]
fn test_data_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let url = format!("duckdb:{}", tmp.path().join("ledger.duckdb").display());

    {
        let db = DbConnection::open_from_url(&url).unwrap();
        db.execute_batch("CREATE TABLE \"MEMBERS\" (\"MEMBER_GUID\" VARCHAR)")
            .unwrap();
        db.bulk_insert_rows("MEMBERS", &["MEMBER_GUID"], &[vec![DbValue::from("m1")]])
            .unwrap();
    }

    let db = DbConnection::open_from_url(&url).unwrap();
    assert!(db.table_exists("MEMBERS").unwrap());
    assert_eq!(db.row_count("MEMBERS").unwrap(), 1);
}

#[test]
fn test_unsupported_url_is_not_available() {
    let err = DbConnection::open_from_url("sqlite:/tmp/x.db").unwrap_err();
    assert!(matches!(err, BackendError::NotAvailable(_)));
}

#[test]
fn test_text_params_are_cast_to_column_types() {
    let db = DbConnection::open_duckdb_memory().unwrap();
    db.execute_batch(
        "CREATE TABLE t (amount DECIMAL(38,2), opened DATE, seen TIMESTAMP, note VARCHAR)",
    )
    .unwrap();

    let opened = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let seen = opened.and_hms_opt(13, 45, 0).unwrap();
    let rows = vec![vec![
        DbValue::from(Decimal::new(-12_345, 2)),
        DbValue::from(opened),
        DbValue::from(seen),
        DbValue::Null,
    ]];
    db.bulk_insert_rows("t", &["amount", "opened", "seen", "note"], &rows)
        .unwrap();

    let row = db
        .query_one("SELECT amount, opened, seen, note FROM t", &[])
        .unwrap();
    assert_eq!(row.get::<Decimal>(0).unwrap(), Decimal::new(-12_345, 2));
    assert_eq!(row.get::<chrono::NaiveDate>(1).unwrap(), opened);
    assert_eq!(row.get::<chrono::NaiveDateTime>(2).unwrap(), seen);
    assert_eq!(row.get::<Option<String>>(3).unwrap(), None);
}

#[test]
fn test_transaction_rolls_back_on_error() {
    let db = DbConnection::open_duckdb_memory().unwrap();
    db.execute_batch("CREATE TABLE t (amount DECIMAL(10,2))").unwrap();

    let result = db.transaction(|tx| {
        tx.bulk_insert_rows("t", &["amount"], &[vec![DbValue::from("1.50")]])?;
        tx.bulk_insert_rows("t", &["amount"], &[vec![DbValue::from("not_a_number")]])?;
        Ok(())
    });

    assert!(result.is_err());
    assert_eq!(db.row_count("t").unwrap(), 0);
}

#[test]
fn test_table_columns_follow_declared_order() {
    let db = DbConnection::open_duckdb_memory().unwrap();
    db.execute_batch("CREATE TABLE \"LOANS\" (\"ACCOUNT_GUID\" VARCHAR, \"STARTING_DEBT\" DECIMAL)")
        .unwrap();

    assert_eq!(
        db.table_columns("LOANS").unwrap(),
        vec!["ACCOUNT_GUID".to_string(), "STARTING_DEBT".to_string()]
    );
    assert!(db.table_columns("MISSING").unwrap().is_empty());
}

#[test]
fn test_missing_table_error_is_detected() {
    let db = DbConnection::open_duckdb_memory().unwrap();
    let err = db.row_count("NOPE").unwrap_err();
    assert!(err.is_missing_table(), "unexpected error: {}", err);
}
