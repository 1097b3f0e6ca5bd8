//! Quality summaries over stored reports.
//!
//! A summary has three parts: per-table check counts for a recent window,
//! a daily trend over every report passed in, and the most recent failed
//! checks. It is computed from reports alone, so any [`super::ReportStore`]
//! can back it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::quality::{AssessmentReport, RuleResult};

/// Check counts for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    /// Assessed table
    pub table: String,
    /// Rule results in the window
    pub total_checks: u64,
    /// Results within tolerance
    pub passed_checks: u64,
    /// Results over tolerance
    pub failed_checks: u64,
    /// Checks that could not be evaluated
    pub errored_checks: u64,
    /// Mean violation rate over evaluated checks
    pub mean_violation_rate: f64,
}

/// Aggregate of all checks run on one day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// UTC day
    pub date: NaiveDate,
    /// Rule results recorded that day
    pub total_checks: u64,
    /// Results within tolerance
    pub passed_checks: u64,
    /// Mean violation rate over evaluated checks
    pub mean_violation_rate: f64,
}

/// A check that ran and exceeded its tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCheck {
    /// Failing rule
    pub rule_id: String,
    /// Target table
    pub table: String,
    /// Target column
    pub column: String,
    /// Observed violation rate
    pub violation_rate: f64,
    /// Rate the rule tolerated
    pub tolerance: f64,
    /// Human-readable summary of the result
    pub details: String,
    /// When the check ran
    pub evaluated_at: DateTime<Utc>,
}

/// Summary of stored assessment history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    /// Per-table counts, ordered by table name
    pub tables: Vec<TableSummary>,
    /// Daily aggregates, oldest first
    pub trends: Vec<TrendPoint>,
    /// Most recent failures, newest first
    pub failed_checks: Vec<FailedCheck>,
}

#[derive(Default)]
struct Tally {
    total: u64,
    passed: u64,
    failed: u64,
    errored: u64,
    rate_sum: f64,
    evaluated: u64,
}

impl Tally {
    fn add(&mut self, result: &RuleResult) {
        self.total += 1;
        if result.is_error() {
            self.errored += 1;
            return;
        }
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.rate_sum += result.violation_rate;
        self.evaluated += 1;
    }

    fn mean_rate(&self) -> f64 {
        if self.evaluated == 0 {
            0.0
        } else {
            self.rate_sum / self.evaluated as f64
        }
    }
}

/// Summarizes reports.
///
/// # Arguments
/// * `reports` - Reports covering the trend window, in any order
/// * `since` - Start of the window for the per-table counts
/// * `failed_limit` - Maximum number of failed checks to list, newest first
pub fn summarize(
    reports: &[AssessmentReport],
    since: DateTime<Utc>,
    failed_limit: usize,
) -> QualitySummary {
    let mut tables: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut days: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    let mut failed: Vec<&RuleResult> = Vec::new();

    for result in reports.iter().flat_map(|r| r.rule_results.iter()) {
        if result.evaluated_at >= since {
            tables.entry(result.table.as_str()).or_default().add(result);
        }
        days.entry(result.evaluated_at.date_naive())
            .or_default()
            .add(result);
        if !result.passed && !result.is_error() {
            failed.push(result);
        }
    }

    failed.sort_by(|a, b| {
        b.evaluated_at
            .cmp(&a.evaluated_at)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });

    QualitySummary {
        tables: tables
            .into_iter()
            .map(|(table, tally)| TableSummary {
                table: table.to_string(),
                total_checks: tally.total,
                passed_checks: tally.passed,
                failed_checks: tally.failed,
                errored_checks: tally.errored,
                mean_violation_rate: tally.mean_rate(),
            })
            .collect(),
        trends: days
            .into_iter()
            .map(|(date, tally)| TrendPoint {
                date,
                total_checks: tally.total,
                passed_checks: tally.passed,
                mean_violation_rate: tally.mean_rate(),
            })
            .collect(),
        failed_checks: failed
            .into_iter()
            .take(failed_limit)
            .map(|r| FailedCheck {
                rule_id: r.rule_id.clone(),
                table: r.table.clone(),
                column: r.column.clone(),
                violation_rate: r.violation_rate,
                tolerance: r.tolerance,
                details: r.details.clone(),
                evaluated_at: r.evaluated_at,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DqError;
    use crate::quality::{RuleKind, ValidationRule};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap as Map;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    fn report(results: Vec<RuleResult>, run_at: DateTime<Utc>) -> AssessmentReport {
        AssessmentReport {
            dataset: crate::quality::DatasetReference {
                name: "customers".to_string(),
                columns: vec![],
                row_count: 10,
                related_tables: vec![],
            },
            run_at,
            failed_rule_count: results.iter().filter(|r| !r.passed).count(),
            rule_results: results,
            profiles: vec![],
            skipped_profiles: vec![],
            anomalies: vec![],
            dimension_scores: Map::new(),
            overall_score: 1.0,
        }
    }

    fn check(id: &str, table: &str, violating: u64, when: DateTime<Utc>) -> RuleResult {
        let rule = ValidationRule::new(id, table, "c", RuleKind::NotNull);
        RuleResult::from_counts(&rule, 10, violating, "null values", vec![], when)
    }

    #[test]
    fn test_summarize_tables_and_trends() {
        let rule = ValidationRule::new("broken", "orders", "c", RuleKind::NotNull);
        let errored = RuleResult::errored(&rule, &DqError::table_not_found("orders"), at(2, 9));

        let reports = vec![
            report(
                vec![check("a", "customers", 0, at(1, 9)), check("b", "orders", 5, at(1, 9))],
                at(1, 9),
            ),
            report(
                vec![check("a", "customers", 2, at(2, 9)), errored],
                at(2, 9),
            ),
        ];

        let summary = summarize(&reports, at(1, 0), 10);

        assert_eq!(summary.tables.len(), 2);
        let customers = &summary.tables[0];
        assert_eq!(customers.table, "customers");
        assert_eq!(customers.total_checks, 2);
        assert_eq!(customers.passed_checks, 1);
        assert_eq!(customers.failed_checks, 1);
        assert!((customers.mean_violation_rate - 0.1).abs() < 1e-9);

        let orders = &summary.tables[1];
        assert_eq!(orders.total_checks, 2);
        assert_eq!(orders.errored_checks, 1);
        assert!((orders.mean_violation_rate - 0.5).abs() < 1e-9);

        assert_eq!(summary.trends.len(), 2);
        assert_eq!(summary.trends[0].date, at(1, 0).date_naive());
        assert_eq!(summary.trends[0].total_checks, 2);
        assert_eq!(summary.trends[0].passed_checks, 1);

        // Errors are not failed checks
        let ids: Vec<&str> = summary
            .failed_checks
            .iter()
            .map(|f| f.rule_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_summarize_window_and_limit() {
        let reports = vec![
            report(vec![check("old", "customers", 1, at(1, 9))], at(1, 9)),
            report(vec![check("new", "customers", 1, at(3, 9))], at(3, 9)),
        ];

        let summary = summarize(&reports, at(3, 9) - Duration::hours(1), 1);
        assert_eq!(summary.tables[0].total_checks, 1);
        assert_eq!(summary.trends.len(), 2);
        assert_eq!(summary.failed_checks.len(), 1);
        assert_eq!(summary.failed_checks[0].rule_id, "new");
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[], Utc::now(), 10);
        assert!(summary.tables.is_empty());
        assert!(summary.trends.is_empty());
        assert!(summary.failed_checks.is_empty());
    }
}
