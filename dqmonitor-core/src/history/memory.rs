//! In-memory report store.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ReportStore;
use crate::Result;
use crate::error::DqError;
use crate::quality::AssessmentReport;

/// Report store holding runs in memory, for tests and one-off sessions.
#[derive(Debug, Default)]
pub struct MemoryReportStore {
    runs: RwLock<Vec<(Uuid, AssessmentReport)>>,
}

impl MemoryReportStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored runs.
    pub fn len(&self) -> usize {
        self.runs.read().map_or(0, |runs| runs.len())
    }

    /// Returns true if no run has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> DqError {
    DqError::Storage {
        context: "In-memory report store lock poisoned".to_string(),
        source: "lock poisoned".into(),
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn append(&self, report: &AssessmentReport) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let mut runs = self.runs.write().map_err(|_| poisoned())?;
        runs.push((id, report.clone()));
        // Keep runs ordered by time; ties keep insertion order
        runs.sort_by_key(|(_, r)| r.run_at);
        Ok(id)
    }

    async fn recent(&self, dataset: &str, limit: usize) -> Result<Vec<AssessmentReport>> {
        let runs = self.runs.read().map_err(|_| poisoned())?;
        Ok(runs
            .iter()
            .rev()
            .filter(|(_, r)| r.dataset.name == dataset)
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<AssessmentReport>> {
        let runs = self.runs.read().map_err(|_| poisoned())?;
        Ok(runs
            .iter()
            .filter(|(_, r)| r.run_at >= since)
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DatasetSnapshot, TableSnapshot};
    use crate::quality::QualityAssessor;
    use chrono::Duration;
    use serde_json::json;

    fn report(dataset: &str, score: f64, minutes_ago: i64) -> AssessmentReport {
        let table = TableSnapshot::from_json_rows(dataset, vec![json!({"id": 1})]).unwrap();
        let mut report = QualityAssessor::with_defaults()
            .assess(&DatasetSnapshot::new(table), &[], None)
            .unwrap();
        report.overall_score = score;
        report.run_at = Utc::now() - Duration::minutes(minutes_ago);
        report
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let store = MemoryReportStore::new();
        store.append(&report("customers", 0.9, 30)).await.unwrap();
        store.append(&report("customers", 0.7, 10)).await.unwrap();
        store.append(&report("orders", 0.5, 5)).await.unwrap();
        store.append(&report("customers", 0.8, 20)).await.unwrap();

        let recent = store.recent("customers", 2).await.unwrap();
        let scores: Vec<f64> = recent.iter().map(|r| r.overall_score).collect();
        assert_eq!(scores, vec![0.7, 0.8]);
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn test_score_series_is_oldest_first() {
        let store = MemoryReportStore::new();
        for (score, ago) in [(0.9, 30), (0.8, 20), (0.7, 10)] {
            store.append(&report("customers", score, ago)).await.unwrap();
        }
        assert_eq!(
            store.score_series("customers", 10).await.unwrap(),
            vec![0.9, 0.8, 0.7]
        );
        assert_eq!(
            store.score_series("customers", 2).await.unwrap(),
            vec![0.8, 0.7]
        );
        assert!(store.score_series("orders", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_since_filters_by_time() {
        let store = MemoryReportStore::new();
        store.append(&report("customers", 0.9, 120)).await.unwrap();
        store.append(&report("orders", 0.8, 5)).await.unwrap();

        let reports = store.since(Utc::now() - Duration::minutes(60)).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].dataset.name, "orders");
    }
}
