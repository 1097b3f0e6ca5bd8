//! Column profiling.
//!
//! Profiles are a pure function of a column's materialized values. The value
//! kind and null predicate come from [`super::classify`], the same functions
//! the rule evaluator uses.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::Value;

use super::anomaly::calculate_statistics;
use super::classify::{ValueKind, as_number, column_kind, is_null, parse_date, value_key};
use super::models::ColumnProfile;
use crate::models::ColumnDef;

/// Computes descriptive statistics for one column.
///
/// # Arguments
/// * `column` - Column definition; its declared type drives classification
/// * `values` - Every cell of the column, one per row
pub fn profile_column(column: &ColumnDef, values: &[&Value]) -> ColumnProfile {
    let kind = column_kind(column.declared_type.as_ref(), values.iter().copied());
    let present: Vec<&Value> = values
        .iter()
        .copied()
        .filter(|v| !is_null(v))
        .collect();

    let row_count = values.len() as u64;
    let null_count = row_count - present.len() as u64;
    let distinct_count = present
        .iter()
        .map(|v| value_key(v))
        .collect::<HashSet<_>>()
        .len() as u64;

    let mut profile = ColumnProfile {
        column: column.name.clone(),
        inferred_type: kind,
        row_count,
        null_count,
        null_percent: percent(null_count, row_count),
        distinct_count,
        distinct_percent: percent(distinct_count, present.len() as u64),
        min: None,
        max: None,
        mean: None,
        std_dev: None,
        min_length: None,
        max_length: None,
        mean_length: None,
    };

    match kind {
        ValueKind::Numeric => profile_numeric(&mut profile, &present),
        ValueKind::Text => profile_text(&mut profile, &present),
        ValueKind::Date => {
            let (min, max) = extremes(&present, |a, b| {
                let a = a.as_str().and_then(parse_date);
                let b = b.as_str().and_then(parse_date);
                a.cmp(&b)
            });
            profile.min = min;
            profile.max = max;
        }
        ValueKind::Boolean => {
            let (min, max) = extremes(&present, |a, b| a.as_bool().cmp(&b.as_bool()));
            profile.min = min;
            profile.max = max;
        }
        ValueKind::Unknown => {}
    }

    profile
}

fn profile_numeric(profile: &mut ColumnProfile, present: &[&Value]) {
    let numbers: Vec<f64> = present.iter().filter_map(|v| as_number(v)).collect();

    // Standard deviation is 0 rather than undefined below two values
    profile.std_dev = Some(0.0);
    if numbers.is_empty() {
        return;
    }

    let (mean, std_dev) = calculate_statistics(&numbers);
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    profile.min = Some(number_value(min));
    profile.max = Some(number_value(max));
    profile.mean = Some(mean);
    if numbers.len() >= 2 {
        profile.std_dev = Some(std_dev);
    }
}

fn profile_text(profile: &mut ColumnProfile, present: &[&Value]) {
    let texts: Vec<String> = present.iter().map(|v| value_key(v)).collect();
    if texts.is_empty() {
        return;
    }

    let lengths: Vec<u64> = texts.iter().map(|s| s.chars().count() as u64).collect();
    profile.min_length = lengths.iter().min().copied();
    profile.max_length = lengths.iter().max().copied();
    profile.mean_length = Some(lengths.iter().sum::<u64>() as f64 / lengths.len() as f64);

    profile.min = texts.iter().min().cloned().map(Value::String);
    profile.max = texts.iter().max().cloned().map(Value::String);
}

/// Smallest and largest values under `cmp`; ties keep the first occurrence.
fn extremes<F>(present: &[&Value], cmp: F) -> (Option<Value>, Option<Value>)
where
    F: Fn(&Value, &Value) -> Ordering,
{
    let min = present
        .iter()
        .copied()
        .reduce(|a, b| if cmp(b, a) == Ordering::Less { b } else { a });
    let max = present
        .iter()
        .copied()
        .reduce(|a, b| if cmp(b, a) == Ordering::Greater { b } else { a });
    (min.cloned(), max.cloned())
}

/// Renders an integral float as a JSON integer so `25` stays `25`.
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
