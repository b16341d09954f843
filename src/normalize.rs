// Type normalizer
// Coercion rules are data: a column name and a target type. A rule either
// converts its whole column or fails the run naming the offending value;
// there is no per-cell skipping that would leave a half-typed column.

use crate::error::PipelineError;
use crate::table::{ListingTable, Value};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// RULE DEFINITIONS
// ============================================================================

/// Target semantic type for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// Currency-tolerant float: strips `$` and thousands separators first.
    Float,
    Int,
    /// Fixed flexible detector, tried in order:
    /// `%Y-%m-%d %H:%M`, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`,
    /// `%Y-%m-%d`, `%m/%d/%Y` (date-only parses get midnight).
    DateTime,
    Bool,
    /// Strip leading/trailing whitespace; non-string cells pass unchanged.
    TrimmedString,
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Float => "float",
            ColumnType::Int => "int",
            ColumnType::DateTime => "datetime",
            ColumnType::Bool => "bool",
            ColumnType::TrimmedString => "trimmed string",
        }
    }
}

/// Convert one column to a target type. A missing column is a no-op so one
/// rule set can serve categories with partially overlapping schemas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoercionRule {
    pub column: String,
    pub target: ColumnType,
}

impl CoercionRule {
    pub fn new(column: impl Into<String>, target: ColumnType) -> Self {
        CoercionRule {
            column: column.into(),
            target,
        }
    }
}

/// Fill null cells of `target` from a regex capture over the string cells
/// of `from` (e.g. pull "1999" out of "Catalina 30 1999"). The pattern's
/// first capture group, trimmed, becomes the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillRule {
    pub target: String,
    pub from: String,
    pub pattern: String,
}

impl BackfillRule {
    pub fn new(
        target: impl Into<String>,
        from: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        BackfillRule {
            target: target.into(),
            from: from.into(),
            pattern: pattern.into(),
        }
    }
}

// ============================================================================
// APPLICATION
// ============================================================================

/// Apply backfill rules in order. Rules whose target or source column is
/// absent are no-ops; an invalid pattern is a configuration error.
pub fn apply_backfills(
    table: &mut ListingTable,
    rules: &[BackfillRule],
) -> Result<(), PipelineError> {
    for rule in rules {
        if !table.has_column(&rule.target) || !table.has_column(&rule.from) {
            continue;
        }
        let regex = compile_pattern(&rule.pattern)?;

        let mut filled = 0usize;
        for row in 0..table.row_count() {
            if !table.get(row, &rule.target).is_null() {
                continue;
            }
            let Some(text) = table.get(row, &rule.from).as_str().map(str::to_string) else {
                continue;
            };
            if let Some(capture) = regex.captures(&text).and_then(|c| c.get(1)) {
                let value = capture.as_str().trim();
                if !value.is_empty() {
                    table.set(row, &rule.target, Value::Str(value.to_string()));
                    filled += 1;
                }
            }
        }
        debug!(
            target = rule.target.as_str(),
            from = rule.from.as_str(),
            filled,
            "backfill rule applied"
        );
    }
    Ok(())
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, PipelineError> {
    Regex::new(pattern)
        .map_err(|err| PipelineError::Configuration(format!("bad backfill pattern: {err}")))
}

/// Apply coercion rules in order, each converting its whole column in
/// place. Rules are independent; when two rules name the same column the
/// later one sees the earlier one's output.
pub fn apply_coercions(
    table: &mut ListingTable,
    rules: &[CoercionRule],
) -> Result<(), PipelineError> {
    for rule in rules {
        if !table.has_column(&rule.column) {
            continue;
        }

        // Convert the full column before writing anything back, so a failed
        // rule leaves the table untouched.
        let mut converted = Vec::with_capacity(table.row_count());
        for row in 0..table.row_count() {
            let cell = table.get(row, &rule.column);
            let value = convert(cell, rule.target).map_err(|offending| {
                PipelineError::Conversion {
                    column: rule.column.clone(),
                    value: offending,
                    target: rule.target.name(),
                }
            })?;
            converted.push(value);
        }
        for (row, value) in converted.into_iter().enumerate() {
            table.set(row, &rule.column, value);
        }
        debug!(column = rule.column.as_str(), target = rule.target.name(), "column coerced");
    }
    Ok(())
}

/// Convert one cell. `Err` carries a rendering of the offending value.
/// Nulls pass through every target unchanged.
fn convert(value: &Value, target: ColumnType) -> Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match target {
        ColumnType::Float => to_float(value),
        ColumnType::Int => to_int(value),
        ColumnType::DateTime => to_datetime(value),
        ColumnType::Bool => to_bool(value),
        ColumnType::TrimmedString => Ok(trim_str(value)),
    }
}

fn to_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Str(s) => {
            let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
            cleaned
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| s.clone())
        }
        other => Err(other.render()),
    }
}

fn to_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) if f.fract() == 0.0 => Ok(Value::Int(*f as i64)),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| s.clone()),
        other => Err(other.render()),
    }
}

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

fn to_datetime(value: &Value) -> Result<Value, String> {
    match value {
        Value::DateTime(dt) => Ok(Value::DateTime(*dt)),
        Value::Str(s) => {
            let text = s.trim();
            for format in DATETIME_FORMATS {
                if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
                    return Ok(Value::DateTime(dt));
                }
            }
            for format in DATE_FORMATS {
                if let Ok(date) = NaiveDate::parse_from_str(text, format) {
                    // Date-only inputs land on midnight
                    if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                        return Ok(Value::DateTime(dt));
                    }
                }
            }
            Err(s.clone())
        }
        other => Err(other.render()),
    }
}

fn to_bool(value: &Value) -> Result<Value, String> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::Str(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(s.clone()),
        },
        other => Err(other.render()),
    }
}

fn trim_str(value: &Value) -> Value {
    match value {
        Value::Str(s) => Value::Str(s.trim().to_string()),
        other => other.clone(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
