//! CSV cell conversion into typed store values.

use crate::types::{ColumnType, DecimalSpec};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ledgerload_db::{DbValue, Decimal};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

/// Significant digits a `Decimal` always holds exactly.
const MAX_EXACT_DIGITS: usize = 28;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Convert one raw cell to the value inserted for a column of `column_type`.
///
/// Empty cells are NULL for every type. Returns `None` when the text does not
/// parse as the declared type, or when a number has more integer or
/// fractional digits than its column holds.
pub fn convert_cell(raw: &str, column_type: ColumnType) -> Option<DbValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(DbValue::Null);
    }

    match column_type {
        ColumnType::Numeric { spec } => {
            convert_numeric(trimmed, spec.unwrap_or(DecimalSpec::DEFAULT))
        }
        ColumnType::Date => parse_date(trimmed).map(DbValue::Date),
        ColumnType::Timestamp => parse_timestamp(trimmed).map(DbValue::Timestamp),
        ColumnType::String | ColumnType::Text => Some(DbValue::Text(raw.to_string())),
    }
}

fn plain_decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([+-]?)(\d*)(?:\.(\d*))?$").expect("decimal pattern is valid")
    })
}

/// A plain decimal literal split into sign and significant digits.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlainDecimal<'a> {
    negative: bool,
    /// Integer digits without leading zeros.
    integer: &'a str,
    /// Fractional digits without trailing zeros.
    fraction: &'a str,
}

impl<'a> PlainDecimal<'a> {
    fn parse(text: &'a str) -> Option<Self> {
        let captures = plain_decimal_pattern().captures(text)?;
        let integer = captures.get(2).map_or("", |m| m.as_str());
        let fraction = captures.get(3).map_or("", |m| m.as_str());
        if integer.is_empty() && fraction.is_empty() {
            return None;
        }
        Some(Self {
            negative: captures.get(1).is_some_and(|m| m.as_str() == "-"),
            integer: integer.trim_start_matches('0'),
            fraction: fraction.trim_end_matches('0'),
        })
    }

    fn fits(&self, spec: DecimalSpec) -> bool {
        self.integer.len() <= spec.integer_digits() as usize
            && self.fraction.len() <= spec.scale as usize
    }

    fn digits(&self) -> usize {
        self.integer.len() + self.fraction.len()
    }

    /// Canonical text DuckDB casts to the column's DECIMAL type.
    fn canonical(&self) -> String {
        let mut text = String::new();
        if self.negative {
            text.push('-');
        }
        text.push_str(if self.integer.is_empty() { "0" } else { self.integer });
        if !self.fraction.is_empty() {
            text.push('.');
            text.push_str(self.fraction);
        }
        text
    }
}

/// Plain (`-100`, `12.50`) or scientific (`1.5e3`) notation, checked against
/// the column's precision and scale.
///
/// Plain literals longer than a `Decimal` holds are passed on as text for the
/// store to cast.
fn convert_numeric(text: &str, spec: DecimalSpec) -> Option<DbValue> {
    if let Some(literal) = PlainDecimal::parse(text) {
        if !literal.fits(spec) {
            return None;
        }
        let canonical = literal.canonical();
        if literal.digits() > MAX_EXACT_DIGITS {
            return Some(DbValue::Text(canonical));
        }
        return Decimal::from_str(&canonical).ok().map(DbValue::Decimal);
    }

    let value = Decimal::from_scientific(text).ok()?.normalize();
    decimal_fits(value, spec).then_some(DbValue::Decimal(value))
}

fn decimal_fits(value: Decimal, spec: DecimalSpec) -> bool {
    let integer = value.trunc().abs();
    let integer_digits = if integer.is_zero() {
        0
    } else {
        integer.to_string().len()
    };
    value.scale() <= spec.scale && integer_digits <= spec.integer_digits() as usize
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| parse_timestamp_only(text).map(|ts| ts.date()))
}

pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    parse_timestamp_only(text).or_else(|| {
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

fn parse_timestamp_only(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMERIC: ColumnType = ColumnType::Numeric { spec: None };

    #[test]
    fn empty_cells_are_null_for_every_type() {
        for column_type in [
            NUMERIC,
            ColumnType::String,
            ColumnType::Date,
            ColumnType::Timestamp,
            ColumnType::Text,
        ] {
            assert_eq!(convert_cell("", column_type), Some(DbValue::Null));
            assert_eq!(convert_cell("  ", column_type), Some(DbValue::Null));
        }
    }

    #[test]
    fn numeric_cells_parse_exactly() {
        assert_eq!(
            convert_cell("-100", NUMERIC),
            Some(DbValue::Decimal(Decimal::from(-100)))
        );
        assert_eq!(
            convert_cell("12.50", NUMERIC),
            Some(DbValue::Decimal(Decimal::new(1250, 2)))
        );
        assert_eq!(
            convert_cell("1.5e3", NUMERIC),
            Some(DbValue::Decimal(Decimal::from(1500)))
        );
        assert_eq!(
            convert_cell("+.5", NUMERIC),
            Some(DbValue::Decimal(Decimal::new(5, 1)))
        );
        assert_eq!(convert_cell("not_a_number", NUMERIC), None);
        assert_eq!(convert_cell(".", NUMERIC), None);
        assert_eq!(convert_cell("1,000", NUMERIC), None);
    }

    fn numeric(precision: u32, scale: u32) -> ColumnType {
        ColumnType::Numeric {
            spec: Some(DecimalSpec { precision, scale }),
        }
    }

    #[test]
    fn excess_fractional_digits_are_rejected() {
        assert_eq!(convert_cell("12.345", numeric(38, 2)), None);
        assert_eq!(convert_cell("1.5e-3", numeric(38, 2)), None);
        assert_eq!(convert_cell("0.00000000001", NUMERIC), None);
        assert_eq!(
            convert_cell("12.3400", numeric(38, 2)),
            Some(DbValue::Decimal(Decimal::new(1234, 2)))
        );
        assert_eq!(
            convert_cell("0.0004", NUMERIC),
            Some(DbValue::Decimal(Decimal::new(4, 4)))
        );
    }

    #[test]
    fn excess_integer_digits_are_rejected() {
        assert_eq!(convert_cell("123.00", numeric(4, 2)), None);
        assert_eq!(convert_cell("1e3", numeric(4, 2)), None);
        assert_eq!(
            convert_cell("0012.50", numeric(4, 2)),
            Some(DbValue::Decimal(Decimal::new(1250, 2)))
        );
    }

    #[test]
    fn wide_literals_are_passed_as_text() {
        assert_eq!(
            convert_cell("123456789012345678901234567890.12", numeric(38, 2)),
            Some(DbValue::Text("123456789012345678901234567890.12".to_string()))
        );
        assert_eq!(
            convert_cell("-000123456789012345678901234567890.10", numeric(38, 2)),
            Some(DbValue::Text("-123456789012345678901234567890.1".to_string()))
        );
        assert_eq!(
            convert_cell("1234567890123456789012345678901234567.12", numeric(38, 2)),
            None
        );
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 7, 4).unwrap();
        assert_eq!(parse_date("2023-07-04"), Some(expected));
        assert_eq!(parse_date("07/04/2023"), Some(expected));
        assert_eq!(parse_date("2023-07-04 09:30:00"), Some(expected));
        assert_eq!(parse_date("July 4th"), None);
    }

    #[test]
    fn timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 7, 4)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2023-07-04 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-07-04T09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-07-04T11:30:00+02:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2023-07-04"),
            NaiveDate::from_ymd_opt(2023, 7, 4).unwrap().and_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn text_cells_are_kept_verbatim() {
        assert_eq!(
            convert_cell(" Alice ", ColumnType::String),
            Some(DbValue::Text(" Alice ".to_string()))
        );
    }
}
