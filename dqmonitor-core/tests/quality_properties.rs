//! Property tests for profiler, evaluator, scorer and anomaly invariants.

use dqmonitor_core::models::{ColumnDef, DataType, DatasetSnapshot, TableSnapshot};
use dqmonitor_core::quality::{
    AnomalyConfig, AnomalyMethod, QualityAssessor, RuleKind, ValidationRule, detect_anomalies, profile_column,
};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!("")),
        (-1000i64..1000).prop_map(|n| json!(n)),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
        "[a-z@.]{1,8}".prop_map(|s| json!(s)),
    ]
}

fn snapshot(values: &[Value]) -> DatasetSnapshot {
    let rows = values
        .iter()
        .map(|v| {
            let mut row = Map::new();
            row.insert("c".to_string(), v.clone());
            row
        })
        .collect();
    DatasetSnapshot::new(TableSnapshot::new(
        "t",
        vec![ColumnDef::untyped("c")],
        rows,
    ))
}

fn all_kinds() -> Vec<ValidationRule> {
    vec![
        ValidationRule::new("nn", "t", "c", RuleKind::NotNull),
        ValidationRule::new("fmt", "t", "c", RuleKind::format(r"^[a-z]+@")),
        ValidationRule::new("rng", "t", "c", RuleKind::range(Some(-10.0), Some(500.0))),
        ValidationRule::new("uniq", "t", "c", RuleKind::Uniqueness),
        ValidationRule::new("fk", "t", "c", RuleKind::foreign_key("t", "c")),
    ]
}

proptest! {
    #[test]
    fn prop_numeric_profile_is_ordered(values in prop::collection::vec(-1.0e9f64..1.0e9, 1..60)) {
        let cells: Vec<Value> = values.iter().map(|v| json!(v)).collect();
        let refs: Vec<&Value> = cells.iter().collect();
        let profile = profile_column(&ColumnDef::new("x", DataType::Float), &refs);

        let mean = profile.mean.unwrap();
        let min = profile.min.as_ref().and_then(Value::as_f64).unwrap();
        let max = profile.max.as_ref().and_then(Value::as_f64).unwrap();
        let slack = 1e-6 * max.abs().max(min.abs()).max(1.0);
        prop_assert!(min <= mean + slack);
        prop_assert!(mean <= max + slack);
        prop_assert!(profile.std_dev.unwrap() >= 0.0);
    }

    #[test]
    fn prop_violation_rate_is_bounded(values in prop::collection::vec(cell(), 0..40)) {
        let report = QualityAssessor::with_defaults()
            .assess(&snapshot(&values), &all_kinds(), None)
            .unwrap();

        for result in &report.rule_results {
            prop_assert!((0.0..=1.0).contains(&result.violation_rate));
            if result.violating_rows == 0 {
                prop_assert_eq!(result.violation_rate, 0.0);
            }
            prop_assert!(result.violating_rows <= result.total_rows);
        }
        prop_assert!((0.0..=1.0).contains(&report.overall_score));
        for score in report.dimension_scores.values() {
            prop_assert!((0.0..=1.0).contains(&score.score));
            if score.contributing_rules.is_empty() {
                prop_assert_eq!(score.score, 1.0);
            }
        }
    }

    #[test]
    fn prop_runs_are_idempotent(values in prop::collection::vec(cell(), 0..30)) {
        let snapshot = snapshot(&values);
        let assessor = QualityAssessor::with_defaults();
        let first = assessor.assess(&snapshot, &all_kinds(), None).unwrap();
        let second = assessor.assess(&snapshot, &all_kinds(), None).unwrap();
        prop_assert!(first.same_content_as(&second));
    }

    #[test]
    fn prop_zero_variance_never_flags(
        value in -1.0e15f64..1.0e15,
        len in 1usize..50,
        threshold in 0.01f64..10.0,
        iqr in any::<bool>(),
    ) {
        let method = if iqr { AnomalyMethod::Iqr } else { AnomalyMethod::ZScore };
        let config = AnomalyConfig::default().with_method(method).with_threshold(threshold);
        let flags = detect_anomalies("x", &vec![value; len], &config);
        prop_assert!(flags.iter().all(|f| !f.flagged));
    }
}
