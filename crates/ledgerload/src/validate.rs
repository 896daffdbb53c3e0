//! Column validation and reconciliation for incoming batches.
//!
//! A batch is accepted when every declared column is present in the file.
//! Columns the schema does not declare are dropped with a warning, and the
//! remaining columns are reordered into declared order before insertion.
//! Names are compared case-sensitively.

use crate::schema::SchemaDefinition;
use serde::Serialize;
use std::collections::HashSet;

/// Why a batch was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The table is not in the schema description.
    UnknownTable,
    /// At least one declared column is absent from the file.
    MissingColumns,
}

/// How to turn a file's records into rows in declared column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    /// Target columns, in schema order.
    pub columns: Vec<String>,
    /// For each target column, its index in the source record.
    pub source_indices: Vec<usize>,
    /// Source columns that are not inserted.
    pub dropped: Vec<String>,
}

impl ReconciliationPlan {
    /// Project one source record onto the target columns.
    pub fn project<'r>(&self, record: &'r csv::StringRecord) -> Vec<&'r str> {
        self.source_indices
            .iter()
            .map(|index| record.get(*index).unwrap_or(""))
            .collect()
    }

    pub fn column_refs(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }
}

/// Outcome of checking a batch's columns against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationResult {
    Accepted {
        plan: ReconciliationPlan,
        extra: Vec<String>,
    },
    Rejected {
        reason: RejectReason,
        missing: Vec<String>,
        extra: Vec<String>,
    },
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationResult::Accepted { .. })
    }

    pub fn missing(&self) -> &[String] {
        match self {
            ValidationResult::Accepted { .. } => &[],
            ValidationResult::Rejected { missing, .. } => missing,
        }
    }

    pub fn extra(&self) -> &[String] {
        match self {
            ValidationResult::Accepted { extra, .. } | ValidationResult::Rejected { extra, .. } => {
                extra
            }
        }
    }

    pub fn plan(&self) -> Option<&ReconciliationPlan> {
        match self {
            ValidationResult::Accepted { plan, .. } => Some(plan),
            ValidationResult::Rejected { .. } => None,
        }
    }

    /// Human-readable rejection reason, if rejected.
    pub fn rejection_message(&self, table: &str) -> Option<String> {
        match self {
            ValidationResult::Accepted { .. } => None,
            ValidationResult::Rejected {
                reason: RejectReason::UnknownTable,
                ..
            } => Some(format!("no schema for table {}", table)),
            ValidationResult::Rejected {
                reason: RejectReason::MissingColumns,
                missing,
                ..
            } => Some(format!(
                "missing required column(s) for {}: {}",
                table,
                missing.join(", ")
            )),
        }
    }
}

/// Compare a file's header against the declared columns of `table`.
pub fn validate_columns(
    table: &str,
    actual: &[String],
    schema: &SchemaDefinition,
) -> ValidationResult {
    let Some(expected) = schema.columns(table) else {
        return ValidationResult::Rejected {
            reason: RejectReason::UnknownTable,
            missing: Vec::new(),
            extra: actual.to_vec(),
        };
    };

    let expected_set: HashSet<&str> = expected.iter().copied().collect();

    // First occurrence wins; a repeated header name counts as extra.
    let mut seen = HashSet::new();
    let mut extra = Vec::new();
    for column in actual {
        if !expected_set.contains(column.as_str()) || !seen.insert(column.as_str()) {
            extra.push(column.clone());
        }
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|column| !seen.contains(*column))
        .map(|column| column.to_string())
        .collect();

    if !missing.is_empty() {
        return ValidationResult::Rejected {
            reason: RejectReason::MissingColumns,
            missing,
            extra,
        };
    }

    let source_indices = expected
        .iter()
        .filter_map(|column| actual.iter().position(|a| a == column))
        .collect();

    ValidationResult::Accepted {
        plan: ReconciliationPlan {
            columns: expected.iter().map(|c| c.to_string()).collect(),
            source_indices,
            dropped: extra.clone(),
        },
        extra,
    }
}
