//! Mapping from schema data-type tokens to column storage types.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

/// Precision and scale of a fixed-point column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DecimalSpec {
    pub precision: u32,
    pub scale: u32,
}

impl DecimalSpec {
    /// Width used for a bare `numeric`: DuckDB's widest decimal.
    pub const DEFAULT: DecimalSpec = DecimalSpec {
        precision: 38,
        scale: 10,
    };

    /// Digits allowed left of the decimal point.
    pub fn integer_digits(&self) -> u32 {
        self.precision.saturating_sub(self.scale)
    }
}

/// Storage type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnType {
    /// Fixed-point number; `None` means [`DecimalSpec::DEFAULT`].
    Numeric { spec: Option<DecimalSpec> },
    /// Unbounded character data declared as VARCHAR/TEXT.
    String,
    /// Calendar date without time.
    Date,
    /// Date and time of day.
    Timestamp,
    /// Fallback for tokens nothing else matched.
    Text,
}

impl ColumnType {
    /// DuckDB DDL spelling of this type.
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Numeric { spec } => {
                let spec = spec.unwrap_or(DecimalSpec::DEFAULT);
                format!("DECIMAL({},{})", spec.precision, spec.scale)
            }
            ColumnType::String => "VARCHAR".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Text => "TEXT".to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_type())
    }
}

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"numeric\((\d+)\s*,\s*(\d+)\)").expect("numeric pattern is valid")
    })
}

/// Map a raw DATA_TYPE token to a [`ColumnType`].
///
/// Matching is case-insensitive on the trimmed token and the first rule that
/// applies wins: `numeric…`, then `varchar`/`text`, then `date`, then
/// `timestamp`. Anything else becomes [`ColumnType::Text`] with a warning;
/// this function never fails.
pub fn map_type(token: &str) -> ColumnType {
    let normalized = token.trim().to_lowercase();

    if normalized.starts_with("numeric") {
        return ColumnType::Numeric {
            spec: parse_decimal_spec(&normalized),
        };
    }

    if normalized.contains("varchar") || normalized.contains("text") {
        return ColumnType::String;
    }

    if normalized.contains("date") && !normalized.contains("timestamp") {
        return ColumnType::Date;
    }

    if normalized.contains("timestamp") {
        return ColumnType::Timestamp;
    }

    warn!(token = %token, "Unrecognized data type, falling back to TEXT");
    ColumnType::Text
}

fn parse_decimal_spec(normalized: &str) -> Option<DecimalSpec> {
    let captures = numeric_pattern().captures(normalized)?;
    let precision = captures[1].parse::<u32>();
    let scale = captures[2].parse::<u32>();
    match (precision, scale) {
        (Ok(precision), Ok(scale)) => Some(DecimalSpec { precision, scale }),
        _ => {
            warn!(token = %normalized, "NUMERIC precision out of range, using default");
            None
        }
    }
}
