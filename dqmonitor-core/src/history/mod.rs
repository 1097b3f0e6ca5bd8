//! Assessment report history.
//!
//! The engine never retains reports. Callers append finished reports to a
//! [`ReportStore`] and read them back for trend summaries and for the
//! score series used as the anomaly baseline of the next run.

pub mod memory;
pub mod summary;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::Result;
use crate::quality::AssessmentReport;

pub use memory::MemoryReportStore;
#[cfg(feature = "sqlite")]
pub use sqlite::{RuleOutcome, SqliteReportStore};
pub use summary::{FailedCheck, QualitySummary, TableSummary, TrendPoint, summarize};

/// Append-only store of assessment reports keyed by dataset and run time.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Appends a finished report and returns the id assigned to the run.
    async fn append(&self, report: &AssessmentReport) -> Result<Uuid>;

    /// Returns up to `limit` most recent reports of a dataset, newest first.
    async fn recent(&self, dataset: &str, limit: usize) -> Result<Vec<AssessmentReport>>;

    /// Returns every report run at or after `since`, oldest first.
    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<AssessmentReport>>;

    /// Returns up to `limit` most recent overall scores of a dataset,
    /// oldest first, ready to pass as the assessor's history baseline.
    async fn score_series(&self, dataset: &str, limit: usize) -> Result<Vec<f64>> {
        let mut scores: Vec<f64> = self
            .recent(dataset, limit)
            .await?
            .iter()
            .map(|r| r.overall_score)
            .collect();
        scores.reverse();
        Ok(scores)
    }
}
