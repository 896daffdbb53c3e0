//! Values exchanged with the store and typed access to result rows.

use crate::error::BackendError;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// Value type for query parameters and result cells.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Decimal(Decimal),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        DbValue::Integer(v as i64)
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        DbValue::Real(v)
    }
}

impl From<Decimal> for DbValue {
    fn from(v: Decimal) -> Self {
        DbValue::Decimal(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Boolean(v)
    }
}

impl From<NaiveDate> for DbValue {
    fn from(v: NaiveDate) -> Self {
        DbValue::Date(v)
    }
}

impl From<NaiveDateTime> for DbValue {
    fn from(v: NaiveDateTime) -> Self {
        DbValue::Timestamp(v)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DbValue::Null,
        }
    }
}

/// Row data from a query result.
#[derive(Debug, Clone)]
pub struct DbRow {
    columns: Vec<String>,
    values: Vec<DbValue>,
}

impl DbRow {
    pub fn new(columns: Vec<String>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column index.
    pub fn get<T: FromDbValue>(&self, index: usize) -> Result<T, BackendError> {
        self.values
            .get(index)
            .ok_or_else(|| {
                BackendError::TypeConversion(format!("Column index {} out of bounds", index))
            })
            .and_then(|v| T::from_db_value(v))
    }

    /// Get a value by column name.
    pub fn get_by_name<T: FromDbValue>(&self, name: &str) -> Result<T, BackendError> {
        let index =
            self.columns.iter().position(|c| c == name).ok_or_else(|| {
                BackendError::TypeConversion(format!("Column '{}' not found", name))
            })?;
        self.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn get_raw(&self, index: usize) -> Option<&DbValue> {
        self.values.get(index)
    }
}

/// Trait for converting from DbValue.
pub trait FromDbValue: Sized {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError>;
}

fn null_error(type_name: &str) -> BackendError {
    BackendError::TypeConversion(format!(
        "{0} field is NULL - use Option<{0}> for nullable columns",
        type_name
    ))
}

impl FromDbValue for i64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Integer(v) => Ok(*v),
            DbValue::Null => Err(null_error("i64")),
            _ => Err(BackendError::TypeConversion("Expected integer".to_string())),
        }
    }
}

impl FromDbValue for f64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Real(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v as f64),
            DbValue::Null => Err(null_error("f64")),
            _ => Err(BackendError::TypeConversion("Expected real".to_string())),
        }
    }
}

impl FromDbValue for Decimal {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Decimal(v) => Ok(*v),
            DbValue::Integer(v) => Ok(Decimal::from(*v)),
            DbValue::Real(v) => Decimal::try_from(*v)
                .map_err(|e| BackendError::TypeConversion(format!("Expected decimal: {}", e))),
            DbValue::Text(v) => v
                .parse::<Decimal>()
                .map_err(|e| BackendError::TypeConversion(format!("Expected decimal: {}", e))),
            DbValue::Null => Err(null_error("Decimal")),
            _ => Err(BackendError::TypeConversion("Expected decimal".to_string())),
        }
    }
}

impl FromDbValue for String {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Text(v) => Ok(v.clone()),
            DbValue::Null => Err(null_error("String")),
            _ => Err(BackendError::TypeConversion("Expected text".to_string())),
        }
    }
}

impl FromDbValue for bool {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Boolean(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v != 0),
            DbValue::Null => Err(null_error("bool")),
            _ => Err(BackendError::TypeConversion("Expected boolean".to_string())),
        }
    }
}

impl FromDbValue for NaiveDate {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Date(v) => Ok(*v),
            DbValue::Null => Err(null_error("NaiveDate")),
            _ => Err(BackendError::TypeConversion("Expected date".to_string())),
        }
    }
}

impl FromDbValue for NaiveDateTime {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Timestamp(v) => Ok(*v),
            DbValue::Null => Err(null_error("NaiveDateTime")),
            _ => Err(BackendError::TypeConversion("Expected timestamp".to_string())),
        }
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Null => Ok(None),
            _ => T::from_db_value(value).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_accepts_integer_and_text_cells() {
        let from_int: Decimal = Decimal::from_db_value(&DbValue::Integer(-100)).unwrap();
        assert_eq!(from_int, Decimal::from(-100));

        let from_text: Decimal = Decimal::from_db_value(&DbValue::from("12.50")).unwrap();
        assert_eq!(from_text, Decimal::new(1250, 2));
    }

    #[test]
    fn null_requires_option() {
        assert!(String::from_db_value(&DbValue::Null).is_err());
        let value: Option<String> = Option::from_db_value(&DbValue::Null).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn get_by_name_reports_unknown_column() {
        let row = DbRow::new(vec!["ID".to_string()], vec![DbValue::Integer(1)]);
        assert_eq!(row.get_by_name::<i64>("ID").unwrap(), 1);
        assert!(row.get_by_name::<i64>("NAME").is_err());
    }
}
