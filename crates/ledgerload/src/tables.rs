//! Table creation from a schema description.
//!
//! This is DESTRUCTIVE. Every described table is dropped (if present) and
//! created fresh, so any rows it held are lost. Drop-and-recreate is the only
//! migration strategy: there is no ALTER path. Tables the description does
//! not mention are left alone.

use crate::error::{LoadError, Result};
use crate::schema::{SchemaDefinition, TableSchema};
use ledgerload_db::{quote_ident, DbConnection};
use std::path::Path;
use tracing::{info, warn};

/// `CREATE TABLE` statement for one described table.
pub fn create_table_sql(table: &TableSchema) -> String {
    let columns = table
        .typed_columns()
        .into_iter()
        .map(|(name, column_type)| format!("{} {}", quote_ident(name), column_type.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_ident(table.name()), columns)
}

fn drop_table_sql(table: &TableSchema) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table.name()))
}

/// Drop and recreate every table in `schema` as a single transaction.
///
/// On failure the transaction is rolled back and the error names the table
/// whose statement the store rejected.
pub fn create_tables(conn: &DbConnection, schema: &SchemaDefinition) -> Result<()> {
    if schema.is_empty() {
        warn!("Schema description declares no tables; nothing to create");
        return Ok(());
    }

    let mut current = String::new();
    let result = conn.transaction(|tx| {
        for table in schema.tables() {
            current = table.name().to_string();
            tx.execute_batch(&drop_table_sql(table))?;
            tx.execute_batch(&create_table_sql(table))?;
            info!(
                table = %table.name(),
                columns = table.columns().len(),
                "Table recreated"
            );
        }
        Ok(())
    });

    result.map_err(|source| LoadError::SchemaBuild {
        table: current,
        source,
    })?;

    info!(tables = schema.len(), "Created tables from schema description");
    Ok(())
}

/// Parse the description at `schema_path`, then recreate its tables.
pub fn create_tables_from_path(conn: &DbConnection, schema_path: &Path) -> Result<SchemaDefinition> {
    let schema = SchemaDefinition::from_path(schema_path)?;
    create_tables(conn, &schema)?;
    Ok(schema)
}
