//! Assessment orchestration.
//!
//! This module provides the main `QualityAssessor` that runs the profiler,
//! rule evaluator, anomaly detector and scorer over one dataset snapshot and
//! assembles the immutable `AssessmentReport`.

use chrono::Utc;

use crate::Result;
use crate::error::DqError;
use crate::models::{DatasetSnapshot, TableSnapshot};

use super::anomaly::detect_anomalies;
use super::classify::{ValueKind, as_number, column_kind};
use super::config::QualityConfig;
use super::evaluator::evaluate_rule;
use super::models::{
    AnomalyFlag, AssessmentReport, ColumnProfile, DatasetReference, RuleResult, SkippedProfile,
};
use super::profiler::profile_column;
use super::rules::ValidationRule;
use super::scorer::score_results;

/// Subject recorded on anomaly flags raised over the score history.
pub const OVERALL_SCORE_SUBJECT: &str = "overall_score";

/// Quality assessor for running validation rules against a dataset.
///
/// The assessor holds configuration only. Every input of a run (snapshot,
/// rules, score history) is passed in, so one assessor can serve
/// independent runs from several threads.
///
/// # Example
///
/// ```rust,ignore
/// use dqmonitor_core::quality::{QualityAssessor, QualityConfig};
///
/// let assessor = QualityAssessor::new(QualityConfig::default());
/// let report = assessor.assess(&snapshot, &rules, None)?;
/// println!("Quality score: {:.2}%", report.overall_score * 100.0);
/// ```
#[derive(Debug, Clone)]
pub struct QualityAssessor {
    config: QualityConfig,
}

impl QualityAssessor {
    /// Creates a new assessor with the given configuration.
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Creates a new assessor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(QualityConfig::default())
    }

    /// Returns a reference to the assessor configuration.
    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Runs one assessment over a dataset snapshot.
    ///
    /// Disabled rules are skipped. A rule that cannot be evaluated becomes a
    /// failed result carrying the error, and the run continues.
    ///
    /// # Arguments
    /// * `snapshot` - The primary table plus any referenced tables
    /// * `rules` - Rules in evaluation order
    /// * `history` - Previous overall scores of this dataset, oldest first
    ///
    /// # Errors
    /// Returns `Configuration` if the assessor configuration is invalid.
    pub fn assess(
        &self,
        snapshot: &DatasetSnapshot,
        rules: &[ValidationRule],
        history: Option<&[f64]>,
    ) -> Result<AssessmentReport> {
        self.config
            .validate()
            .map_err(|e| DqError::configuration(e.to_string()))?;

        let run_at = Utc::now();
        let primary = &snapshot.primary;
        if primary.is_empty() {
            tracing::info!(
                "{}; statistics fall back to defaults",
                DqError::EmptyDataset {
                    table: primary.name.clone()
                }
            );
        }

        let (profiles, skipped_profiles) = self.profile_targets(primary, rules);

        let mut rule_results = Vec::with_capacity(rules.len());
        for rule in rules {
            if !rule.enabled {
                tracing::debug!("Skipping disabled rule '{}'", rule.id);
                continue;
            }
            let result =
                match evaluate_rule(rule, snapshot, self.config.max_violation_samples, run_at) {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!("Rule '{}' could not be evaluated: {}", rule.id, e);
                        RuleResult::errored(rule, &e, run_at)
                    }
                };
            tracing::debug!(
                "Rule '{}' on {}.{}: {}",
                result.rule_id,
                result.table,
                result.column,
                result.details
            );
            rule_results.push(result);
        }

        let mut anomalies = self.column_anomalies(primary);

        let scores = score_results(
            &primary.name,
            &rule_results,
            &profiles,
            &self.config.severity_weights,
        );

        if let Some(history) = history {
            anomalies.extend(self.history_anomalies(history, scores.overall));
        }

        let failed_rule_count = rule_results.iter().filter(|r| !r.passed).count();
        let report = AssessmentReport {
            dataset: DatasetReference {
                name: primary.name.clone(),
                columns: primary.columns.clone(),
                row_count: primary.row_count() as u64,
                related_tables: snapshot.related.keys().cloned().collect(),
            },
            run_at,
            rule_results,
            profiles,
            skipped_profiles,
            anomalies,
            dimension_scores: scores.dimensions,
            overall_score: scores.overall,
            failed_rule_count,
        };

        tracing::info!("{}", report.run_summary());
        Ok(report)
    }

    /// Profiles every column of a table without evaluating rules.
    pub fn profile_table(&self, table: &TableSnapshot) -> Vec<ColumnProfile> {
        table
            .columns
            .iter()
            .map(|column| {
                let values: Vec<_> = table
                    .rows
                    .iter()
                    .map(|row| row.get(&column.name).unwrap_or(&serde_json::Value::Null))
                    .collect();
                profile_column(column, &values)
            })
            .collect()
    }

    /// Assesses several datasets independently.
    ///
    /// Each snapshot is assessed with the rules targeting its primary table.
    /// Datasets that fail assessment are logged and skipped rather than
    /// aborting the entire batch.
    pub fn assess_all(
        &self,
        snapshots: &[DatasetSnapshot],
        rules: &[ValidationRule],
    ) -> Result<Vec<AssessmentReport>> {
        let mut reports = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let table_rules: Vec<ValidationRule> = rules
                .iter()
                .filter(|r| r.target.table == snapshot.name())
                .cloned()
                .collect();
            match self.assess(snapshot, &table_rules, None) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!("Assessment failed for dataset '{}': {}", snapshot.name(), e);
                }
            }
        }
        Ok(reports)
    }

    /// Profiles the primary table's columns plus any primary-table column
    /// named by a rule. Rule targets missing from the table are skipped.
    fn profile_targets(
        &self,
        primary: &TableSnapshot,
        rules: &[ValidationRule],
    ) -> (Vec<ColumnProfile>, Vec<SkippedProfile>) {
        let mut skipped: Vec<SkippedProfile> = Vec::new();
        if !self.config.profile_columns {
            return (Vec::new(), skipped);
        }

        let profiles = self.profile_table(primary);

        for rule in rules.iter().filter(|r| r.enabled) {
            let column = &rule.target.column;
            if rule.target.table != primary.name
                || primary.column(column).is_some()
                || skipped.iter().any(|s| &s.column == column)
            {
                continue;
            }
            let reason = DqError::column_not_found(&primary.name, column).to_string();
            tracing::warn!("Skipping profile: {}", reason);
            skipped.push(SkippedProfile {
                table: primary.name.clone(),
                column: column.clone(),
                reason,
            });
        }

        (profiles, skipped)
    }

    /// Runs the column detector over every numeric column of the primary
    /// table. Columns are classified here, so detection does not depend on
    /// `profile_columns`.
    ///
    /// Flag indexes are row positions in the primary table.
    fn column_anomalies(&self, primary: &TableSnapshot) -> Vec<AnomalyFlag> {
        let config = &self.config.anomaly_detection;
        if !config.enabled {
            return Vec::new();
        }

        let mut flags = Vec::new();
        for column in &primary.columns {
            let Ok(cells) = primary.column_values(&column.name) else {
                continue;
            };
            if column_kind(column.declared_type.as_ref(), cells.iter().copied()) != ValueKind::Numeric {
                continue;
            }

            let (rows, values): (Vec<usize>, Vec<f64>) = cells
                .iter()
                .enumerate()
                .filter_map(|(i, cell)| as_number(cell).map(|n| (i, n)))
                .unzip();

            flags.extend(
                detect_anomalies(&column.name, &values, config)
                    .into_iter()
                    .filter(|f| f.flagged)
                    .map(|mut f| {
                        f.index = f.index.and_then(|i| rows.get(i).copied());
                        f
                    }),
            );
        }
        flags
    }

    /// Evaluates the current score against the historical series.
    ///
    /// Only a flag on the newest point (this run) is reported; earlier points
    /// were judged by earlier runs.
    fn history_anomalies(&self, history: &[f64], current: f64) -> Vec<AnomalyFlag> {
        let mut series = history.to_vec();
        series.push(current);
        let newest = series.len() - 1;

        detect_anomalies(OVERALL_SCORE_SUBJECT, &series, &self.config.history_anomaly)
            .into_iter()
            .filter(|f| f.flagged && f.index == Some(newest))
            .collect()
    }
}
