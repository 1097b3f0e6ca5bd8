//! Value classification shared by the profiler and the rule evaluator.
//!
//! Both components decide what counts as null through [`is_null`], so a
//! profile's null count and a not-null rule's violation count always agree
//! for the same column.  The [`ValueKind`] only drives statistics and
//! comparisons, never nullness.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::DataType;

/// Effective kind of a column's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Free-form strings
    Text,
    /// Integers, floats and numeric strings
    Numeric,
    /// ISO-8601 dates and datetimes
    Date,
    /// JSON booleans
    Boolean,
    /// No declared type and no non-null values to sample
    Unknown,
}

impl ValueKind {
    /// Returns the lowercase tag used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Numeric => "numeric",
            ValueKind::Date => "date",
            ValueKind::Boolean => "boolean",
            ValueKind::Unknown => "unknown",
        }
    }

}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves the value kind of a column.
///
/// The declared type wins when it maps to a kind. Otherwise the non-empty,
/// non-null values are sampled: all numbers (or numeric strings) gives
/// `Numeric`, all booleans gives `Boolean`, all ISO dates gives `Date`,
/// anything else is `Text`. A column with nothing to sample is `Unknown`.
pub fn column_kind<'a, I>(declared: Option<&DataType>, values: I) -> ValueKind
where
    I: IntoIterator<Item = &'a Value>,
{
    match declared {
        Some(DataType::Text) => return ValueKind::Text,
        Some(DataType::Integer | DataType::Float) => return ValueKind::Numeric,
        Some(DataType::Boolean) => return ValueKind::Boolean,
        Some(DataType::Date | DataType::DateTime) => return ValueKind::Date,
        Some(DataType::Binary | DataType::Other(_)) | None => {}
    }

    let mut seen = false;
    let mut all_numeric = true;
    let mut all_boolean = true;
    let mut all_dates = true;

    for value in values {
        match value {
            Value::Null => continue,
            Value::String(s) if s.is_empty() => continue,
            _ => {}
        }
        seen = true;
        all_numeric &= as_number(value).is_some();
        all_boolean &= value.is_boolean();
        all_dates &= value.as_str().is_some_and(|s| parse_date(s).is_some());

        if !all_numeric && !all_boolean && !all_dates {
            return ValueKind::Text;
        }
    }

    if !seen {
        ValueKind::Unknown
    } else if all_numeric {
        ValueKind::Numeric
    } else if all_boolean {
        ValueKind::Boolean
    } else if all_dates {
        ValueKind::Date
    } else {
        ValueKind::Text
    }
}

/// The null predicate used by every component of a run.
///
/// JSON null and the empty string are null whatever the column kind; an
/// empty cell in a numeric column carries no value to range-check.
pub fn is_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Extracts a finite numeric value from a JSON value.
///
/// String representations are parsed; non-finite values such as "NaN" or
/// "inf" are rejected so they cannot poison statistics.
pub fn as_number(value: &Value) -> Option<f64> {
    let numeric = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    numeric.filter(|v| v.is_finite())
}

/// Parses ISO-8601 dates and datetimes into a sortable timestamp.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Converts a value to a canonical string used for equality grouping and
/// for violation samples.
///
/// Numbers are normalised through `f64` when they are integral so that `2`
/// and `2.0` group together, matching SQL comparison semantics.
pub fn value_key(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
