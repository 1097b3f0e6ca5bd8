//! Assessment result models.
//!
//! Everything here is produced once per run and never mutated afterwards.
//! Reports own their contents outright so a caller can persist, serialize or
//! drop them without touching the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::classify::ValueKind;
use super::config::AnomalyMethod;
use super::rules::{Severity, ValidationRule};
use crate::models::ColumnDef;

/// A named axis of data quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityDimension {
    /// Values are present
    Completeness,
    /// Values lie within expected bounds
    Accuracy,
    /// Values agree across rows and tables
    Consistency,
    /// Values have the expected shape
    Validity,
}

impl QualityDimension {
    /// Every dimension, in report order.
    pub const ALL: [QualityDimension; 4] = [
        QualityDimension::Completeness,
        QualityDimension::Accuracy,
        QualityDimension::Consistency,
        QualityDimension::Validity,
    ];

    /// Lowercase dimension name.
    pub fn name(&self) -> &'static str {
        match self {
            QualityDimension::Completeness => "completeness",
            QualityDimension::Accuracy => "accuracy",
            QualityDimension::Consistency => "consistency",
            QualityDimension::Validity => "validity",
        }
    }
}

impl std::fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of evaluating one rule once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Id of the evaluated rule
    pub rule_id: String,
    /// Canonical kind name, e.g. `not_null`
    pub rule_kind: String,
    /// Target table
    pub table: String,
    /// Target column
    pub column: String,
    /// Severity copied from the rule
    pub severity: Severity,
    /// Dimension the rule scores into; `None` for unsupported kinds
    pub dimension: Option<QualityDimension>,
    /// Violation rate the rule tolerated when it was evaluated
    pub tolerance: f64,
    /// Violation rate within tolerance and no evaluation error
    pub passed: bool,
    /// Rows in the target table
    pub total_rows: u64,
    /// Rows that broke the rule
    pub violating_rows: u64,
    /// `violating_rows / total_rows`, or 0.0 for an empty table
    pub violation_rate: f64,
    /// Bounded list of offending values, rendered as strings
    pub samples: Vec<String>,
    /// Human-readable summary such as `2/4 null values (50.00%)`
    pub details: String,
    /// Set when the rule could not be evaluated at all
    pub error: Option<String>,
    /// Time of evaluation, shared by every result of a run
    pub evaluated_at: DateTime<Utc>,
}

impl RuleResult {
    /// Builds a result from violation counts.
    ///
    /// `label` names what was counted ("null values", "duplicate rows") and
    /// feeds the details line.
    pub fn from_counts(
        rule: &ValidationRule,
        total_rows: u64,
        violating_rows: u64,
        label: &str,
        samples: Vec<String>,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        if violating_rows > total_rows {
            tracing::warn!(
                "Rule '{}' reported {} violations for {} rows",
                rule.id,
                violating_rows,
                total_rows
            );
        }

        let violation_rate = if total_rows == 0 {
            0.0
        } else {
            (violating_rows as f64 / total_rows as f64).clamp(0.0, 1.0)
        };

        Self {
            rule_id: rule.id.clone(),
            rule_kind: rule.kind.name().to_string(),
            table: rule.target.table.clone(),
            column: rule.target.column.clone(),
            severity: rule.severity,
            dimension: rule.kind.dimension(),
            tolerance: rule.tolerance,
            passed: violation_rate <= rule.tolerance,
            total_rows,
            violating_rows,
            violation_rate,
            samples,
            details: format!(
                "{}/{} {} ({:.2}%)",
                violating_rows,
                total_rows,
                label,
                violation_rate * 100.0
            ),
            error: None,
            evaluated_at,
        }
    }

    /// Builds a failed result for a rule that could not be evaluated.
    pub fn errored(
        rule: &ValidationRule,
        error: &crate::error::DqError,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_kind: rule.kind.name().to_string(),
            table: rule.target.table.clone(),
            column: rule.target.column.clone(),
            severity: rule.severity,
            dimension: rule.kind.dimension(),
            tolerance: rule.tolerance,
            passed: false,
            total_rows: 0,
            violating_rows: 0,
            violation_rate: 0.0,
            samples: Vec::new(),
            details: format!("Evaluation failed: {}", error),
            error: Some(error.to_string()),
            evaluated_at,
        }
    }

    /// Returns true if the rule could not be evaluated.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Descriptive statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    /// Profiled column
    pub column: String,
    /// Kind resolved from the declared type or sampled values
    pub inferred_type: ValueKind,
    /// Rows in the table
    pub row_count: u64,
    /// Rows whose value is null or empty
    pub null_count: u64,
    /// Percentage (0-100) of rows that are null
    pub null_percent: f64,
    /// Exact number of distinct non-null values
    pub distinct_count: u64,
    /// Percentage (0-100) of non-null values that are distinct
    pub distinct_percent: f64,
    /// Smallest non-null value in the column's natural ordering
    pub min: Option<Value>,
    /// Largest non-null value in the column's natural ordering
    pub max: Option<Value>,
    /// Population mean; numeric columns only
    pub mean: Option<f64>,
    /// Population standard deviation; numeric columns only
    pub std_dev: Option<f64>,
    /// Value length statistics; text columns only
    pub min_length: Option<u64>,
    /// Longest value, in characters
    pub max_length: Option<u64>,
    /// Mean value length, in characters
    pub mean_length: Option<f64>,
}

/// A profiling target that could not be profiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedProfile {
    /// Table named by the rule
    pub table: String,
    /// Column that could not be profiled
    pub column: String,
    /// Why profiling was skipped
    pub reason: String,
}

/// One value evaluated by the anomaly detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    /// Column or metric name
    pub subject: String,
    /// Detector that produced the flag
    pub method: AnomalyMethod,
    /// Position of the value in the evaluated sample
    pub index: Option<usize>,
    /// The evaluated value
    pub value: f64,
    /// |z| for z-score; distance outside the fences for IQR
    pub score: f64,
    /// Z-score threshold or IQR fence multiplier in effect
    pub threshold: f64,
    /// Lowest value that is not an outlier
    pub lower_bound: f64,
    /// Highest value that is not an outlier
    pub upper_bound: f64,
    /// Whether the value fell outside the bounds
    pub flagged: bool,
}

/// Score of a single quality dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// The scored dimension
    pub dimension: QualityDimension,
    /// Score in [0, 1]; 1.0 when no rule contributed
    pub score: f64,
    /// Ids of the rule results that contributed
    pub contributing_rules: Vec<String>,
    /// Columns whose profiles back the contributing rules
    pub contributing_profiles: Vec<String>,
}

impl DimensionScore {
    /// A dimension with no evidence of a problem.
    pub fn unchecked(dimension: QualityDimension) -> Self {
        Self {
            dimension,
            score: 1.0,
            contributing_rules: Vec::new(),
            contributing_profiles: Vec::new(),
        }
    }
}

/// The assessed dataset as it looked during the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReference {
    /// Primary table name
    pub name: String,
    /// Primary table columns
    pub columns: Vec<ColumnDef>,
    /// Primary table rows at run time
    pub row_count: u64,
    /// Referenced tables loaded alongside the primary table
    pub related_tables: Vec<String>,
}

/// Root aggregate of one assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentReport {
    /// What was assessed
    pub dataset: DatasetReference,
    /// Start of the run
    pub run_at: DateTime<Utc>,
    /// Results in rule-set order
    pub rule_results: Vec<RuleResult>,
    /// Column profiles of the primary table
    pub profiles: Vec<ColumnProfile>,
    /// Rule targets that could not be profiled
    pub skipped_profiles: Vec<SkippedProfile>,
    /// Flagged values only
    pub anomalies: Vec<AnomalyFlag>,
    /// One score per dimension
    pub dimension_scores: BTreeMap<QualityDimension, DimensionScore>,
    /// Mean of the dimension scores, in [0, 1]
    pub overall_score: f64,
    /// Results that did not pass, errors included
    pub failed_rule_count: usize,
}

impl AssessmentReport {
    /// Number of rules that passed.
    pub fn passed_rule_count(&self) -> usize {
        self.rule_results.len() - self.failed_rule_count
    }

    /// Iterates over failed rule results.
    pub fn failed_results(&self) -> impl Iterator<Item = &RuleResult> {
        self.rule_results.iter().filter(|r| !r.passed)
    }

    /// Looks up the score of one dimension.
    pub fn dimension_score(&self, dimension: QualityDimension) -> f64 {
        self.dimension_scores
            .get(&dimension)
            .map_or(1.0, |d| d.score)
    }

    /// One-line summary for logs and terminal output.
    pub fn run_summary(&self) -> String {
        format!(
            "{}: {}/{} rules passed, overall score {:.3}, {} anomalies, {} rows",
            self.dataset.name,
            self.passed_rule_count(),
            self.rule_results.len(),
            self.overall_score,
            self.anomalies.len(),
            self.dataset.row_count
        )
    }

    /// Compares two reports ignoring run and evaluation timestamps.
    pub fn same_content_as(&self, other: &AssessmentReport) -> bool {
        self.without_timestamps() == other.without_timestamps()
    }

    fn without_timestamps(&self) -> AssessmentReport {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let mut normalized = self.clone();
        normalized.run_at = epoch;
        for result in &mut normalized.rule_results {
            result.evaluated_at = epoch;
        }
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::rules::RuleKind;

    fn rule() -> ValidationRule {
        ValidationRule::new("email_not_null", "customers", "email", RuleKind::NotNull)
    }

    #[test]
    fn test_from_counts_rate_and_details() {
        let result = RuleResult::from_counts(&rule(), 4, 2, "null values", vec![], Utc::now());
        assert!((result.violation_rate - 0.5).abs() < 1e-9);
        assert!(!result.passed);
        assert_eq!(result.details, "2/4 null values (50.00%)");
        assert_eq!(result.dimension, Some(QualityDimension::Completeness));
        assert_eq!(result.rule_kind, "not_null");
    }

    #[test]
    fn test_from_counts_empty_table() {
        let result = RuleResult::from_counts(&rule(), 0, 0, "null values", vec![], Utc::now());
        assert_eq!(result.violation_rate, 0.0);
        assert!(result.passed);
    }

    #[test]
    fn test_from_counts_respects_tolerance() {
        let tolerant = rule().with_tolerance(0.5);
        let result = RuleResult::from_counts(&tolerant, 4, 2, "null values", vec![], Utc::now());
        assert!(result.passed);

        let result = RuleResult::from_counts(&tolerant, 4, 3, "null values", vec![], Utc::now());
        assert!(!result.passed);
    }

    #[test]
    fn test_errored_result() {
        let error = crate::error::DqError::unsupported_rule_kind("business_rule");
        let result = RuleResult::errored(&rule(), &error, Utc::now());
        assert!(!result.passed);
        assert!(result.is_error());
        assert_eq!(result.violation_rate, 0.0);
        assert!(result.details.contains("business_rule"));
    }

    #[test]
    fn test_dimension_serializes_as_map_key() {
        let mut scores = BTreeMap::new();
        scores.insert(
            QualityDimension::Accuracy,
            DimensionScore::unchecked(QualityDimension::Accuracy),
        );
        let json = serde_json::to_value(&scores).unwrap();
        assert!(json.get("accuracy").is_some());

        let back: BTreeMap<QualityDimension, DimensionScore> =
            serde_json::from_value(json).unwrap();
        assert_eq!(back, scores);
    }

    #[test]
    fn test_same_content_ignores_timestamps() {
        let report = AssessmentReport {
            dataset: DatasetReference {
                name: "customers".to_string(),
                columns: vec![],
                row_count: 4,
                related_tables: vec![],
            },
            run_at: Utc::now(),
            rule_results: vec![RuleResult::from_counts(
                &rule(),
                4,
                2,
                "null values",
                vec![],
                Utc::now(),
            )],
            profiles: vec![],
            skipped_profiles: vec![],
            anomalies: vec![],
            dimension_scores: BTreeMap::new(),
            overall_score: 0.875,
            failed_rule_count: 1,
        };

        let mut later = report.clone();
        later.run_at = report.run_at + chrono::Duration::seconds(30);
        later.rule_results[0].evaluated_at = later.run_at;
        assert!(report.same_content_as(&later));
        assert_ne!(report, later);

        later.overall_score = 0.5;
        assert!(!report.same_content_as(&later));

        assert_eq!(report.passed_rule_count(), 0);
        assert!(report.run_summary().starts_with("customers: 0/1 rules passed"));
    }
}
