//! Schema description parsing.
//!
//! The description is a CSV with one row per column:
//!
//! ```text
//! TABLE_NAME,COLUMN_NAME,DATA_TYPE
//! MEMBERS,MEMBER_GUID,VARCHAR
//! CHECKING,STARTING_BALANCE,"NUMERIC(38,2)"
//! ```
//!
//! Rows are grouped by TABLE_NAME. Tables keep the order in which their name
//! first appears; columns keep file order within their table.

use crate::error::{LoadError, Result};
use crate::types::{map_type, ColumnType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Header fields the description must carry (case-sensitive).
pub const REQUIRED_HEADERS: [&str; 3] = ["TABLE_NAME", "COLUMN_NAME", "DATA_TYPE"];

/// A description row as it appears in the file.
#[derive(Debug, Deserialize)]
struct SchemaRow {
    #[serde(rename = "TABLE_NAME")]
    table_name: String,
    #[serde(rename = "COLUMN_NAME")]
    column_name: String,
    #[serde(rename = "DATA_TYPE", default)]
    data_type: String,
}

/// One declared column. The DATA_TYPE token is mapped once, on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaColumn {
    pub table_name: String,
    pub column_name: String,
    /// Raw DATA_TYPE token.
    pub data_type: String,
    column_type: ColumnType,
}

impl SchemaColumn {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        let data_type = data_type.into();
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            column_type: map_type(&data_type),
            data_type,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }
}

impl From<SchemaRow> for SchemaColumn {
    fn from(row: SchemaRow) -> Self {
        SchemaColumn::new(row.table_name, row.column_name, row.data_type)
    }
}

/// Declared columns of one table, in description order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    columns: Vec<SchemaColumn>,
}

impl TableSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_name.as_str()).collect()
    }

    /// (name, type) pairs in declared order.
    pub fn typed_columns(&self) -> Vec<(&str, ColumnType)> {
        self.columns
            .iter()
            .map(|c| (c.column_name.as_str(), c.column_type()))
            .collect()
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.column_name == column)
            .map(SchemaColumn::column_type)
    }
}

/// Every table the description declares.
///
/// Invariants: each table has at least one column and column names are
/// unique within a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDefinition {
    tables: Vec<TableSchema>,
    index: HashMap<String, usize>,
}

impl SchemaDefinition {
    /// Read and parse a schema description file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| LoadError::parse(path, e.to_string()))?;
        let schema = Self::from_reader(file, path)?;
        info!(
            path = %path.display(),
            tables = schema.len(),
            "Schema description loaded"
        );
        Ok(schema)
    }

    /// Parse a schema description from any reader. `origin` names the source
    /// in error messages.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| LoadError::parse(origin, e.to_string()))?
            .clone();
        let missing: Vec<&str> = REQUIRED_HEADERS
            .iter()
            .copied()
            .filter(|required| !headers.iter().any(|h| h == *required))
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::parse(
                origin,
                format!("missing required header field(s): {}", missing.join(", ")),
            ));
        }

        let mut columns = Vec::new();
        for (index, record) in csv_reader.deserialize::<SchemaRow>().enumerate() {
            let row = record.map_err(|e| {
                LoadError::parse(origin, format!("row {}: {}", index + 1, e))
            })?;
            columns.push(SchemaColumn::from(row));
        }

        Self::from_columns(columns).map_err(|message| LoadError::parse(origin, message))
    }

    /// Build a definition from already-parsed rows.
    pub fn from_columns(
        columns: impl IntoIterator<Item = SchemaColumn>,
    ) -> std::result::Result<Self, String> {
        let mut schema = Self::default();

        for (row, column) in columns.into_iter().enumerate() {
            if column.table_name.is_empty() {
                return Err(format!("row {}: TABLE_NAME is empty", row + 1));
            }
            if column.column_name.is_empty() {
                return Err(format!(
                    "row {}: COLUMN_NAME is empty for table {}",
                    row + 1,
                    column.table_name
                ));
            }

            let slot = match schema.index.get(&column.table_name) {
                Some(slot) => *slot,
                None => {
                    schema.tables.push(TableSchema {
                        name: column.table_name.clone(),
                        columns: Vec::new(),
                    });
                    let slot = schema.tables.len() - 1;
                    schema.index.insert(column.table_name.clone(), slot);
                    slot
                }
            };

            let table = &mut schema.tables[slot];
            if table
                .columns
                .iter()
                .any(|c| c.column_name == column.column_name)
            {
                return Err(format!(
                    "row {}: duplicate column {} in table {}",
                    row + 1,
                    column.column_name,
                    column.table_name
                ));
            }
            debug!(
                table = %column.table_name,
                column = %column.column_name,
                data_type = %column.data_type,
                "Schema column"
            );
            table.columns.push(column);
        }

        Ok(schema)
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.index.get(name).map(|slot| &self.tables[*slot])
    }

    /// Declared column names of a table, if the table is described.
    pub fn columns(&self, table: &str) -> Option<Vec<&str>> {
        self.table(table).map(TableSchema::column_names)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Parse the schema description at `path`.
pub fn load_schema(path: &Path) -> Result<SchemaDefinition> {
    SchemaDefinition::from_path(path)
}
