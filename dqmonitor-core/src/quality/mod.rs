//! Rule evaluation and quality scoring engine.
//!
//! This module turns one dataset snapshot plus a rule set into an
//! [`AssessmentReport`]:
//! - **Profiler**: per-column descriptive statistics
//! - **Evaluator**: pass/fail per validation rule with violation detail
//! - **Anomaly Detection**: z-score and IQR outlier detection
//! - **Scorer**: completeness, accuracy, consistency and validity scores
//!
//! The engine is synchronous and holds no state between runs. Loading data
//! and storing reports belong to [`crate::adapters`] and [`crate::history`].
//!
//! # Example
//! ```rust
//! use dqmonitor_core::models::{DatasetSnapshot, TableSnapshot};
//! use dqmonitor_core::quality::{QualityAssessor, RuleKind, ValidationRule};
//! use serde_json::json;
//!
//! let table = TableSnapshot::from_json_rows(
//!     "customers",
//!     vec![json!({"email": "a@x.com"}), json!({"email": null})],
//! )
//! .unwrap();
//! let rules = vec![ValidationRule::new("email_nn", "customers", "email", RuleKind::NotNull)];
//!
//! let report = QualityAssessor::with_defaults()
//!     .assess(&DatasetSnapshot::new(table), &rules, None)
//!     .unwrap();
//! assert_eq!(report.failed_rule_count, 1);
//! ```

mod anomaly;
mod assessor;
pub mod classify;
mod config;
mod evaluator;
mod models;
mod profiler;
mod rules;
mod scorer;

// Re-export public API
pub use anomaly::detect_anomalies;
pub use assessor::{OVERALL_SCORE_SUBJECT, QualityAssessor};
pub use classify::ValueKind;
pub use config::{
    AnomalyConfig, AnomalyMethod, AnomalySensitivity, ConfigValidationError, QualityConfig,
    SeverityWeights,
};
pub use evaluator::evaluate_rule;
pub use models::{
    AnomalyFlag, AssessmentReport, ColumnProfile, DatasetReference, DimensionScore,
    QualityDimension, RuleResult, SkippedProfile,
};
pub use profiler::profile_column;
pub use rules::{RuleKind, RuleTarget, Severity, ValidationRule};
pub use scorer::{QualityScores, score_results};
