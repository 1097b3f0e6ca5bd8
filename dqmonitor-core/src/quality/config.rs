//! Quality assessment configuration.
//!
//! This module provides configuration for assessment runs: anomaly detection
//! method and thresholds, severity weights used by the scorer, and limits on
//! the detail kept in rule results.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rules::Severity;
use crate::Result;
use crate::error::DqError;

/// Statistical method used by the anomaly detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMethod {
    /// Distance from the mean in standard deviations
    #[default]
    ZScore,
    /// Tukey fences around the interquartile range
    Iqr,
}

impl AnomalyMethod {
    /// Default threshold for the method: 3.0 standard deviations for
    /// z-score, a 1.5 fence multiplier for IQR.
    pub fn default_threshold(&self) -> f64 {
        match self {
            AnomalyMethod::ZScore => 3.0,
            AnomalyMethod::Iqr => 1.5,
        }
    }
}

impl std::fmt::Display for AnomalyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyMethod::ZScore => write!(f, "z_score"),
            AnomalyMethod::Iqr => write!(f, "iqr"),
        }
    }
}

/// Anomaly detection sensitivity level.
///
/// Shorthand for common z-score thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySensitivity {
    /// 3.0 standard deviations - fewer false positives
    #[default]
    Low,
    /// 2.5 standard deviations - balanced detection
    Medium,
    /// 2.0 standard deviations - more aggressive detection
    High,
}

impl AnomalySensitivity {
    /// Returns the z-score threshold for this sensitivity level.
    pub fn z_score_threshold(&self) -> f64 {
        match self {
            AnomalySensitivity::Low => 3.0,
            AnomalySensitivity::Medium => 2.5,
            AnomalySensitivity::High => 2.0,
        }
    }
}

/// Anomaly detection configuration for one invocation of the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Enable anomaly detection
    pub enabled: bool,
    /// Detection method
    pub method: AnomalyMethod,
    /// Z-score threshold or IQR fence multiplier
    pub threshold: f64,
    /// Restrict detection to the most recent N points of a series
    pub window_size: Option<usize>,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: AnomalyMethod::ZScore,
            threshold: AnomalyMethod::ZScore.default_threshold(),
            window_size: None,
        }
    }
}

impl AnomalyConfig {
    /// Creates a new anomaly config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to enable/disable anomaly detection.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to select the method; resets the threshold to the
    /// method's default.
    pub fn with_method(mut self, method: AnomalyMethod) -> Self {
        self.method = method;
        self.threshold = method.default_threshold();
        self
    }

    /// Builder method to set the threshold.
    ///
    /// Non-positive or non-finite thresholds are replaced by the method's
    /// default.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        if threshold.is_finite() && threshold > 0.0 {
            self.threshold = threshold;
        } else {
            tracing::warn!(
                "anomaly threshold {} is not positive, using default {}",
                threshold,
                self.method.default_threshold()
            );
            self.threshold = self.method.default_threshold();
        }
        self
    }

    /// Builder method to set a z-score threshold from a sensitivity level.
    pub fn with_sensitivity(self, sensitivity: AnomalySensitivity) -> Self {
        self.with_method(AnomalyMethod::ZScore)
            .with_threshold(sensitivity.z_score_threshold())
    }

    /// Builder method to set the series window size.
    pub fn with_window_size(mut self, window_size: Option<usize>) -> Self {
        self.window_size = window_size.filter(|&w| {
            if w == 0 {
                tracing::warn!("window_size 0 ignored, using the full series");
            }
            w > 0
        });
        self
    }
}

/// Multipliers applied to violation rates by rule severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityWeights {
    /// Multiplier for informational rules
    pub informational: f64,
    /// Multiplier for warning rules
    pub warning: f64,
    /// Multiplier for critical rules
    pub critical: f64,
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            informational: 0.5,
            warning: 1.0,
            critical: 2.0,
        }
    }
}

impl SeverityWeights {
    /// Equal weights for every severity.
    pub fn uniform() -> Self {
        Self {
            informational: 1.0,
            warning: 1.0,
            critical: 1.0,
        }
    }

    /// Returns the weight for a severity.
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Informational => self.informational,
            Severity::Warning => self.warning,
            Severity::Critical => self.critical,
        }
    }
}

/// Quality assessment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Outlier detection over numeric column values
    pub anomaly_detection: AnomalyConfig,
    /// Outlier detection over the historical overall-score series
    pub history_anomaly: AnomalyConfig,
    /// Severity multipliers used by the scorer
    pub severity_weights: SeverityWeights,
    /// Maximum offending values kept per rule result
    pub max_violation_samples: usize,
    /// Profile every column of the primary table; column anomaly detection
    /// runs either way
    pub profile_columns: bool,
}

/// Validation errors for quality configuration.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    /// A detector threshold is zero, negative or not finite
    #[error("{field} threshold must be a positive finite number, got {value}")]
    InvalidThreshold {
        /// Config section holding the threshold
        field: &'static str,
        /// The rejected threshold
        value: f64,
    },
    /// A series window of zero points
    #[error("{field} window_size must be at least 1")]
    InvalidWindow {
        /// Config section holding the window
        field: &'static str,
    },
    /// A severity weight is zero or negative
    #[error("severity weights must be positive, got {0:?}")]
    NonPositiveWeight(SeverityWeights),
    /// Weights do not grow with severity
    #[error("severity weights must satisfy critical >= warning >= informational, got {0:?}")]
    UnorderedWeights(SeverityWeights),
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            anomaly_detection: AnomalyConfig::default(),
            // Score series are short; a 2.0 sigma band catches sudden drops
            // without flagging ordinary run-to-run noise.
            history_anomaly: AnomalyConfig::default()
                .with_sensitivity(AnomalySensitivity::High)
                .with_window_size(Some(30)),
            severity_weights: SeverityWeights::default(),
            max_violation_samples: 5,
            profile_columns: true,
        }
    }
}

impl QualityConfig {
    /// Creates a new quality config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set column anomaly detection.
    pub fn with_anomaly_detection(mut self, config: AnomalyConfig) -> Self {
        self.anomaly_detection = config;
        self
    }

    /// Builder method to set history anomaly detection.
    pub fn with_history_anomaly(mut self, config: AnomalyConfig) -> Self {
        self.history_anomaly = config;
        self
    }

    /// Builder method to set severity weights.
    pub fn with_severity_weights(mut self, weights: SeverityWeights) -> Self {
        self.severity_weights = weights;
        self
    }

    /// Builder method to set the violation sample limit.
    pub fn with_max_violation_samples(mut self, limit: usize) -> Self {
        self.max_violation_samples = limit;
        self
    }

    /// Builder method to enable/disable column profiling.
    pub fn with_profile_columns(mut self, enabled: bool) -> Self {
        self.profile_columns = enabled;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        for (field, anomaly) in [
            ("anomaly_detection", &self.anomaly_detection),
            ("history_anomaly", &self.history_anomaly),
        ] {
            if !(anomaly.threshold.is_finite() && anomaly.threshold > 0.0) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field,
                    value: anomaly.threshold,
                });
            }
            if anomaly.window_size == Some(0) {
                return Err(ConfigValidationError::InvalidWindow { field });
            }
        }

        let w = self.severity_weights;
        if [w.informational, w.warning, w.critical]
            .iter()
            .any(|x| !(x.is_finite() && *x > 0.0))
        {
            return Err(ConfigValidationError::NonPositiveWeight(w));
        }
        if w.critical < w.warning || w.warning < w.informational {
            return Err(ConfigValidationError::UnorderedWeights(w));
        }
        Ok(())
    }

    /// Loads and validates a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DqError::io(format!("Failed to read {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            DqError::serialization(format!("Invalid configuration in {}", path.display()), e)
        })?;
        config
            .validate()
            .map_err(|e| DqError::configuration(e.to_string()))?;
        Ok(config)
    }
}
