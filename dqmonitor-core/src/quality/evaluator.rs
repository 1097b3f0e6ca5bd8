//! Rule evaluation.
//!
//! [`evaluate_rule`] is the single dispatch point over [`RuleKind`]. Every
//! check counts violations over the target column's cells and keeps a
//! bounded, sorted sample of distinct offending values, so the result does
//! not depend on row order.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde_json::Value;

use super::classify::{as_number, is_null, value_key};
use super::models::RuleResult;
use super::rules::{RuleKind, ValidationRule};
use crate::Result;
use crate::error::DqError;
use crate::models::{DatasetSnapshot, TableSnapshot};

/// A resolved column: one cell per row.
struct ColumnData<'a> {
    values: Vec<&'a Value>,
}

impl<'a> ColumnData<'a> {
    fn resolve(table: &'a TableSnapshot, column: &str) -> Result<Self> {
        let values = table.column_values(column)?;
        Ok(Self { values })
    }

    fn present(&self) -> impl Iterator<Item = &'a Value> + '_ {
        self.values
            .iter()
            .copied()
            .filter(|v| !is_null(v))
    }
}

/// Collects distinct offending values in sorted order, up to a limit.
struct Samples {
    limit: usize,
    values: BTreeSet<String>,
}

impl Samples {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            values: BTreeSet::new(),
        }
    }

    fn record(&mut self, value: &Value) {
        if self.limit == 0 {
            return;
        }
        self.values.insert(value_key(value));
        // Keep the smallest keys so the sample is independent of row order
        if self.values.len() > self.limit {
            self.values.pop_last();
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.values.into_iter().collect()
    }
}

/// Applies one validation rule to the dataset snapshot.
///
/// The rule's target table is resolved in the snapshot (primary or related).
///
/// # Errors
/// - `TableNotFound` / `ColumnNotFound` if the target does not exist
/// - `MalformedRuleParameters` if a required parameter is missing or invalid
/// - `ReferencedTableUnavailable` if a referenced table was not loaded
/// - `UnsupportedRuleKind` for kinds without an implementation
pub fn evaluate_rule(
    rule: &ValidationRule,
    snapshot: &DatasetSnapshot,
    max_samples: usize,
    evaluated_at: DateTime<Utc>,
) -> Result<RuleResult> {
    let table = snapshot
        .table(&rule.target.table)
        .ok_or_else(|| DqError::table_not_found(&rule.target.table))?;
    let column = ColumnData::resolve(table, &rule.target.column)?;
    let total = column.values.len() as u64;
    let mut samples = Samples::new(max_samples);

    let (violating, label) = match &rule.kind {
        RuleKind::NotNull => {
            let nulls = column.values.len() - column.present().count();
            (nulls as u64, "null values")
        }
        RuleKind::Format {
            pattern,
            case_insensitive,
        } => (
            check_format(rule, &column, pattern.as_deref(), *case_insensitive, &mut samples)?,
            "invalid format",
        ),
        RuleKind::NumericRange { min, max } => (
            check_range(rule, &column, *min, *max, &mut samples)?,
            "out of range",
        ),
        RuleKind::Uniqueness => (check_uniqueness(&column, &mut samples), "duplicate rows"),
        RuleKind::ReferentialIntegrity {
            reference_table,
            reference_column,
            require_not_null,
        } => {
            let reference_table = reference_table.as_deref().ok_or_else(|| {
                DqError::malformed_parameters(&rule.id, "missing 'reference_table' parameter")
            })?;
            let reference_column = reference_column.as_deref().ok_or_else(|| {
                DqError::malformed_parameters(&rule.id, "missing 'reference_column' parameter")
            })?;
            let referenced = snapshot.table(reference_table).ok_or_else(|| {
                DqError::referenced_table_unavailable(
                    reference_table,
                    "table was not loaded into the snapshot",
                )
            })?;
            let referenced = ColumnData::resolve(referenced, reference_column)?;
            (
                check_references(&column, &referenced, *require_not_null, &mut samples),
                "orphan records",
            )
        }
        RuleKind::Unsupported { name, .. } => return Err(DqError::unsupported_rule_kind(name)),
    };

    Ok(RuleResult::from_counts(
        rule,
        total,
        violating,
        label,
        samples.into_vec(),
        evaluated_at,
    ))
}

/// Counts non-null values that do not match the pattern.
///
/// The match is anchored at the start of the value, like a prefix match;
/// patterns that must cover the whole value end with `$`.
fn check_format(
    rule: &ValidationRule,
    column: &ColumnData<'_>,
    pattern: Option<&str>,
    case_insensitive: bool,
    samples: &mut Samples,
) -> Result<u64> {
    let pattern = pattern
        .ok_or_else(|| DqError::malformed_parameters(&rule.id, "missing 'pattern' parameter"))?;
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| {
            DqError::malformed_parameters(&rule.id, format!("invalid pattern '{}': {}", pattern, e))
        })?;

    let mut violating = 0;
    for value in column.present() {
        let text = value_key(value);
        if !regex.find(&text).is_some_and(|m| m.start() == 0) {
            violating += 1;
            samples.record(value);
        }
    }
    Ok(violating)
}

/// Counts non-null values outside `[min, max]` or not numeric at all.
fn check_range(
    rule: &ValidationRule,
    column: &ColumnData<'_>,
    min: Option<f64>,
    max: Option<f64>,
    samples: &mut Samples,
) -> Result<u64> {
    if min.is_none() && max.is_none() {
        return Err(DqError::malformed_parameters(
            &rule.id,
            "numeric range needs at least one of 'min' or 'max'",
        ));
    }
    if let (Some(lo), Some(hi)) = (min, max)
        && lo > hi
    {
        return Err(DqError::malformed_parameters(
            &rule.id,
            format!("min {} is greater than max {}", lo, hi),
        ));
    }

    let mut violating = 0;
    for value in column.present() {
        let in_range = as_number(value).is_some_and(|n| {
            min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi)
        });
        if !in_range {
            violating += 1;
            samples.record(value);
        }
    }
    Ok(violating)
}

/// Counts every occurrence of a non-null value that appears at least twice.
fn check_uniqueness(column: &ColumnData<'_>, samples: &mut Samples) -> u64 {
    let mut groups: HashMap<String, (u64, &Value)> = HashMap::new();
    for value in column.present() {
        groups.entry(value_key(value)).or_insert((0, value)).0 += 1;
    }

    let mut violating = 0;
    for (count, value) in groups.values() {
        if *count >= 2 {
            violating += count;
            samples.record(value);
        }
    }
    violating
}

/// Counts foreign-key values with no match in the referenced column.
fn check_references(
    column: &ColumnData<'_>,
    referenced: &ColumnData<'_>,
    require_not_null: bool,
    samples: &mut Samples,
) -> u64 {
    let keys: HashSet<String> = referenced.present().map(value_key).collect();

    let mut violating = 0;
    for value in &column.values {
        let orphan = if is_null(value) {
            require_not_null
        } else {
            !keys.contains(&value_key(value))
        };
        if orphan {
            violating += 1;
            samples.record(value);
        }
    }
    violating
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDef, DataType};
    use crate::quality::rules::Severity;
    use serde_json::json;

    fn snapshot_with(column: &str, data_type: Option<DataType>, values: Vec<Value>) -> DatasetSnapshot {
        let def = match data_type {
            Some(t) => ColumnDef::new(column, t),
            None => ColumnDef::untyped(column),
        };
        let rows = values
            .into_iter()
            .map(|v| {
                let mut row = serde_json::Map::new();
                row.insert(column.to_string(), v);
                row
            })
            .collect();
        DatasetSnapshot::new(TableSnapshot::new("t", vec![def], rows))
    }

    fn evaluate(rule: &ValidationRule, snapshot: &DatasetSnapshot) -> Result<RuleResult> {
        evaluate_rule(rule, snapshot, 5, Utc::now())
    }

    #[test]
    fn test_not_null_counts_empty_strings() {
        let snapshot = snapshot_with(
            "email",
            Some(DataType::Text),
            vec![json!("a@x.com"), json!(""), json!("b@x.com"), json!(null)],
        );
        let rule = ValidationRule::new("r", "t", "email", RuleKind::NotNull);
        let result = evaluate(&rule, &snapshot).unwrap();

        assert_eq!(result.total_rows, 4);
        assert_eq!(result.violating_rows, 2);
        assert!((result.violation_rate - 0.5).abs() < 1e-9);
        assert!(!result.passed);
        assert_eq!(result.details, "2/4 null values (50.00%)");
    }

    #[test]
    fn test_not_null_counts_empty_strings_in_typed_columns() {
        for data_type in [DataType::Integer, DataType::Boolean] {
            let snapshot = snapshot_with("age", Some(data_type), vec![json!(25), json!(""), json!(40)]);
            let rule = ValidationRule::new("r", "t", "age", RuleKind::NotNull);
            let result = evaluate(&rule, &snapshot).unwrap();

            assert_eq!(result.violating_rows, 1);
            assert!(!result.passed);

            let table = snapshot.table("t").unwrap();
            let values = table.column_values("age").unwrap();
            let profile = crate::quality::profile_column(&table.columns[0], &values);
            assert_eq!(profile.null_count, result.violating_rows);
        }
    }

    #[test]
    fn test_format_case_sensitivity() {
        let snapshot = snapshot_with(
            "code",
            Some(DataType::Text),
            vec![json!("ABC"), json!("abc"), json!(null)],
        );
        let rule = ValidationRule::new("r", "t", "code", RuleKind::format("^[a-z]+$"));
        let result = evaluate(&rule, &snapshot).unwrap();
        assert_eq!(result.violating_rows, 1);
        assert_eq!(result.samples, vec!["ABC".to_string()]);

        let rule = ValidationRule::new(
            "r",
            "t",
            "code",
            RuleKind::Format {
                pattern: Some("^[a-z]+$".into()),
                case_insensitive: true,
            },
        );
        assert_eq!(evaluate(&rule, &snapshot).unwrap().violating_rows, 0);
    }

    #[test]
    fn test_format_match_is_anchored_at_start() {
        let snapshot = snapshot_with(
            "phone",
            Some(DataType::Text),
            vec![json!("+15551234"), json!("call +15551234")],
        );
        let rule = ValidationRule::new("r", "t", "phone", RuleKind::format(r"\+?[1-9]\d{1,14}"));
        assert_eq!(evaluate(&rule, &snapshot).unwrap().violating_rows, 1);
    }

    #[test]
    fn test_format_errors() {
        let snapshot = snapshot_with("code", Some(DataType::Text), vec![json!("x")]);
        let missing = ValidationRule::new(
            "r",
            "t",
            "code",
            RuleKind::Format {
                pattern: None,
                case_insensitive: false,
            },
        );
        assert!(matches!(
            evaluate(&missing, &snapshot),
            Err(DqError::MalformedRuleParameters { .. })
        ));

        let invalid = ValidationRule::new("r", "t", "code", RuleKind::format("(unclosed"));
        assert!(matches!(
            evaluate(&invalid, &snapshot),
            Err(DqError::MalformedRuleParameters { .. })
        ));
    }

    #[test]
    fn test_range_scenario() {
        let snapshot = snapshot_with(
            "age",
            Some(DataType::Integer),
            vec![json!(25), json!(200), json!(-5), json!(40)],
        );
        let rule = ValidationRule::new("r", "t", "age", RuleKind::range(Some(0.0), Some(150.0)));
        let result = evaluate(&rule, &snapshot).unwrap();

        assert_eq!(result.violating_rows, 2);
        assert!((result.violation_rate - 0.5).abs() < 1e-9);
        assert_eq!(result.samples, vec!["-5".to_string(), "200".to_string()]);
    }

    #[test]
    fn test_range_non_numeric_values_violate() {
        let snapshot = snapshot_with(
            "price",
            Some(DataType::Float),
            vec![json!(10.0), json!("ten"), json!(""), json!(null)],
        );
        let rule = ValidationRule::new("r", "t", "price", RuleKind::range(Some(0.0), None));
        // "ten" is unparseable; "" and null are skipped as nulls
        assert_eq!(evaluate(&rule, &snapshot).unwrap().violating_rows, 1);
    }

    #[test]
    fn test_range_requires_a_bound() {
        let snapshot = snapshot_with("age", Some(DataType::Integer), vec![json!(1)]);
        let rule = ValidationRule::new("r", "t", "age", RuleKind::range(None, None));
        assert!(matches!(
            evaluate(&rule, &snapshot),
            Err(DqError::MalformedRuleParameters { .. })
        ));

        let rule = ValidationRule::new("r", "t", "age", RuleKind::range(Some(10.0), Some(1.0)));
        assert!(evaluate(&rule, &snapshot).is_err());
    }

    #[test]
    fn test_uniqueness_counts_all_occurrences() {
        let snapshot = snapshot_with(
            "id",
            Some(DataType::Integer),
            [1, 2, 2, 3, 3, 3].into_iter().map(|v| json!(v)).collect(),
        );
        let rule = ValidationRule::new("r", "t", "id", RuleKind::Uniqueness);
        let result = evaluate(&rule, &snapshot).unwrap();

        assert_eq!(result.violating_rows, 5);
        assert!((result.violation_rate - 5.0 / 6.0).abs() < 1e-9);
        assert_eq!(result.samples, vec!["2".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_uniqueness_ignores_nulls() {
        let snapshot = snapshot_with(
            "email",
            Some(DataType::Text),
            vec![json!(null), json!(null), json!(""), json!("a")],
        );
        let rule = ValidationRule::new("r", "t", "email", RuleKind::Uniqueness);
        assert_eq!(evaluate(&rule, &snapshot).unwrap().violating_rows, 0);
    }

    fn orders_snapshot() -> DatasetSnapshot {
        let orders = TableSnapshot::from_json_rows(
            "orders",
            vec![
                json!({"id": 1, "customer_id": 1}),
                json!({"id": 2, "customer_id": 9}),
                json!({"id": 3, "customer_id": null}),
                json!({"id": 4, "customer_id": 2.0}),
            ],
        )
        .unwrap();
        let customers = TableSnapshot::from_json_rows(
            "customers",
            vec![json!({"id": 1}), json!({"id": 2})],
        )
        .unwrap();
        DatasetSnapshot::new(orders).with_related(customers)
    }

    #[test]
    fn test_referential_integrity() {
        let snapshot = orders_snapshot();
        let rule = ValidationRule::new(
            "fk",
            "orders",
            "customer_id",
            RuleKind::foreign_key("customers", "id"),
        )
        .with_severity(Severity::Critical);
        let result = evaluate(&rule, &snapshot).unwrap();

        assert_eq!(result.violating_rows, 1);
        assert_eq!(result.samples, vec!["9".to_string()]);
        assert_eq!(result.details, "1/4 orphan records (25.00%)");
    }

    #[test]
    fn test_referential_integrity_require_not_null() {
        let snapshot = orders_snapshot();
        let rule = ValidationRule::new(
            "fk",
            "orders",
            "customer_id",
            RuleKind::ReferentialIntegrity {
                reference_table: Some("customers".into()),
                reference_column: Some("id".into()),
                require_not_null: true,
            },
        );
        assert_eq!(evaluate(&rule, &snapshot).unwrap().violating_rows, 2);
    }

    #[test]
    fn test_referential_integrity_missing_table() {
        let snapshot = orders_snapshot();
        let rule = ValidationRule::new(
            "fk",
            "orders",
            "product_id",
            RuleKind::foreign_key("products", "id"),
        );
        // The target column is checked before the referenced table
        assert!(matches!(
            evaluate(&rule, &snapshot),
            Err(DqError::ColumnNotFound { .. })
        ));

        let rule = ValidationRule::new(
            "fk",
            "orders",
            "customer_id",
            RuleKind::foreign_key("products", "id"),
        );
        assert!(matches!(
            evaluate(&rule, &snapshot),
            Err(DqError::ReferencedTableUnavailable { .. })
        ));
    }

    #[test]
    fn test_unsupported_kind() {
        let snapshot = snapshot_with("a", None, vec![json!(1)]);
        let rule = ValidationRule::new(
            "r",
            "t",
            "a",
            RuleKind::Unsupported {
                name: "business_rule".into(),
                parameters: serde_json::Map::new(),
            },
        );
        assert!(matches!(
            evaluate(&rule, &snapshot),
            Err(DqError::UnsupportedRuleKind { .. })
        ));
    }

    #[test]
    fn test_missing_targets() {
        let snapshot = snapshot_with("a", None, vec![json!(1)]);
        let rule = ValidationRule::new("r", "other", "a", RuleKind::NotNull);
        assert!(matches!(
            evaluate(&rule, &snapshot),
            Err(DqError::TableNotFound { .. })
        ));
        let rule = ValidationRule::new("r", "t", "b", RuleKind::NotNull);
        assert!(matches!(
            evaluate(&rule, &snapshot),
            Err(DqError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_table_passes_with_zero_rate() {
        let snapshot = snapshot_with("a", Some(DataType::Text), vec![]);
        let rule = ValidationRule::new("r", "t", "a", RuleKind::NotNull);
        let result = evaluate(&rule, &snapshot).unwrap();
        assert_eq!(result.total_rows, 0);
        assert_eq!(result.violation_rate, 0.0);
        assert!(result.passed);
    }

    #[test]
    fn test_samples_are_bounded_and_order_independent() {
        let values: Vec<Value> = (0..20).map(|i| json!(1000 + i)).collect();
        let mut reversed = values.clone();
        reversed.reverse();

        let rule = ValidationRule::new("r", "t", "n", RuleKind::range(None, Some(10.0)));
        let a = evaluate_rule(
            &rule,
            &snapshot_with("n", Some(DataType::Integer), values),
            3,
            Utc::now(),
        )
        .unwrap();
        let b = evaluate_rule(
            &rule,
            &snapshot_with("n", Some(DataType::Integer), reversed),
            3,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(a.samples.len(), 3);
        assert_eq!(a.samples, b.samples);
        assert_eq!(a.violating_rows, 20);
    }
}
