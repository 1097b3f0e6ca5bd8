//! Statistical anomaly detection.
//!
//! The detector is stateless: every invocation receives the full numeric
//! sample (column values or a historical score series) together with the
//! method and threshold to apply. Any baseline comes from the caller.

use super::config::{AnomalyConfig, AnomalyMethod};
use super::models::AnomalyFlag;

/// Relative tolerance for treating a sample as zero variance; scaled by the
/// magnitude of the mean so rounding noise on large constants is absorbed.
const ZERO_VARIANCE_EPSILON: f64 = 1e-10;

/// Evaluates every value of a numeric sample for outliers.
///
/// Returns one [`AnomalyFlag`] per evaluated value; callers that only want
/// outliers filter on `flagged`. Non-finite inputs are skipped. When the
/// config carries a `window_size`, only the most recent N values are
/// evaluated, and `index` still refers to the position in `values`.
///
/// A z-score sample with zero variance yields no flags at all.
///
/// # Arguments
/// * `subject` - Column or metric name recorded on each flag
/// * `values` - The sample, oldest first for time series
/// * `config` - Method, threshold and window for this invocation
pub fn detect_anomalies(subject: &str, values: &[f64], config: &AnomalyConfig) -> Vec<AnomalyFlag> {
    if !config.enabled {
        return Vec::new();
    }

    let start = match config.window_size {
        Some(window) if window < values.len() => values.len() - window,
        _ => 0,
    };
    let sample: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .skip(start)
        .filter(|(_, v)| v.is_finite())
        .map(|(i, v)| (i, *v))
        .collect();

    if sample.is_empty() {
        return Vec::new();
    }

    match config.method {
        AnomalyMethod::ZScore => z_score_flags(subject, &sample, config.threshold),
        AnomalyMethod::Iqr => iqr_flags(subject, &sample, config.threshold),
    }
}

fn z_score_flags(subject: &str, sample: &[(usize, f64)], threshold: f64) -> Vec<AnomalyFlag> {
    let values: Vec<f64> = sample.iter().map(|(_, v)| *v).collect();
    let (mean, std_dev) = calculate_statistics(&values);

    if is_zero_variance(&values, mean, std_dev) {
        tracing::trace!("No variance in '{}', skipping z-score detection", subject);
        return Vec::new();
    }

    let lower_bound = mean - threshold * std_dev;
    let upper_bound = mean + threshold * std_dev;

    sample
        .iter()
        .map(|&(index, value)| {
            let score = (value - mean).abs() / std_dev;
            AnomalyFlag {
                subject: subject.to_string(),
                method: AnomalyMethod::ZScore,
                index: Some(index),
                value,
                score,
                threshold,
                lower_bound,
                upper_bound,
                flagged: score > threshold,
            }
        })
        .collect()
}

fn is_zero_variance(values: &[f64], mean: f64, std_dev: f64) -> bool {
    let all_equal = values.windows(2).all(|pair| pair[0] == pair[1]);
    all_equal || std_dev <= ZERO_VARIANCE_EPSILON * mean.abs().max(1.0)
}

fn iqr_flags(subject: &str, sample: &[(usize, f64)], multiplier: f64) -> Vec<AnomalyFlag> {
    let mut sorted: Vec<f64> = sample.iter().map(|(_, v)| *v).collect();
    sorted.sort_by(f64::total_cmp);

    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower_bound = q1 - multiplier * iqr;
    let upper_bound = q3 + multiplier * iqr;

    sample
        .iter()
        .map(|&(index, value)| {
            let score = if value < lower_bound {
                lower_bound - value
            } else if value > upper_bound {
                value - upper_bound
            } else {
                0.0
            };
            AnomalyFlag {
                subject: subject.to_string(),
                method: AnomalyMethod::Iqr,
                index: Some(index),
                value,
                score,
                threshold: multiplier,
                lower_bound,
                upper_bound,
                flagged: value < lower_bound || value > upper_bound,
            }
        })
        .collect()
}

/// Quantile of sorted values by linear interpolation between closest ranks.
///
/// `sorted` must be non-empty and ascending.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Calculates mean and population standard deviation for a set of values.
///
/// Uses population standard deviation (divides by n, not n-1).
pub(crate) fn calculate_statistics(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

    (mean, variance.sqrt())
}
