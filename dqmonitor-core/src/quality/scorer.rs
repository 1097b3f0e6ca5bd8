//! Quality dimension scoring.

use std::collections::BTreeMap;

use super::config::SeverityWeights;
use super::models::{ColumnProfile, DimensionScore, QualityDimension, RuleResult};

/// Dimension scores plus the overall score of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityScores {
    /// One entry per dimension
    pub dimensions: BTreeMap<QualityDimension, DimensionScore>,
    /// Mean of the dimension scores
    pub overall: f64,
}

/// Aggregates rule results into per-dimension scores and an overall score.
///
/// Each dimension scores `1 - sum(weight * rate) / sum(weight)` over its
/// evaluated rule results, with the weight taken from the rule's severity.
/// Results that carry an evaluation error have no violation rate and do not
/// contribute; they still count as failed rules in the report. A dimension
/// with no contributing results scores 1.0. The overall score is the
/// unweighted mean of the four dimensions.
///
/// # Arguments
/// * `dataset` - Primary table name, used to match profiles to rules
/// * `results` - Every rule result of the run
/// * `profiles` - Column profiles of the primary table
/// * `weights` - Severity multipliers
pub fn score_results(
    dataset: &str,
    results: &[RuleResult],
    profiles: &[ColumnProfile],
    weights: &SeverityWeights,
) -> QualityScores {
    let mut dimensions = BTreeMap::new();

    for dimension in QualityDimension::ALL {
        let contributing: Vec<&RuleResult> = results
            .iter()
            .filter(|r| r.dimension == Some(dimension) && !r.is_error())
            .collect();

        if contributing.is_empty() {
            dimensions.insert(dimension, DimensionScore::unchecked(dimension));
            continue;
        }

        let mut weighted_rate = 0.0;
        let mut weight_total = 0.0;
        for result in &contributing {
            let weight = weights.weight(result.severity);
            weighted_rate += weight * result.violation_rate;
            weight_total += weight;
        }
        let score = if weight_total > 0.0 {
            1.0 - weighted_rate / weight_total
        } else {
            1.0
        };

        let contributing_profiles = profiles
            .iter()
            .filter(|p| {
                contributing
                    .iter()
                    .any(|r| r.table == dataset && r.column == p.column)
            })
            .map(|p| p.column.clone())
            .collect();

        dimensions.insert(
            dimension,
            DimensionScore {
                dimension,
                score: score.clamp(0.0, 1.0),
                contributing_rules: contributing.iter().map(|r| r.rule_id.clone()).collect(),
                contributing_profiles,
            },
        );
    }

    let overall = dimensions.values().map(|d| d.score).sum::<f64>() / dimensions.len() as f64;

    QualityScores {
        dimensions,
        overall: overall.clamp(0.0, 1.0),
    }
}
