//! SQLite-backed report store.
//!
//! Each run is one row of `assessment_runs` holding the full report as JSON,
//! plus one row per rule result in `rule_results` so single rules can be
//! tracked over time without decoding reports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::ReportStore;
use crate::Result;
use crate::adapters::sqlite::{OpenMode, open_pool};
use crate::error::DqError;
use crate::quality::{AssessmentReport, RuleResult};

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS assessment_runs (
        id TEXT PRIMARY KEY,
        dataset TEXT NOT NULL,
        run_at TEXT NOT NULL,
        overall_score REAL NOT NULL,
        report TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_runs_dataset_time ON assessment_runs (dataset, run_at)",
    r#"
    CREATE TABLE IF NOT EXISTS rule_results (
        run_id TEXT NOT NULL REFERENCES assessment_runs (id),
        rule_id TEXT NOT NULL,
        table_name TEXT NOT NULL,
        column_name TEXT NOT NULL,
        rule_kind TEXT NOT NULL,
        status TEXT NOT NULL,
        violation_rate REAL NOT NULL,
        details TEXT NOT NULL,
        run_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_rule_results_rule ON rule_results (rule_id, run_at)",
];

/// Stored outcome of one rule in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Id of the run that produced the outcome
    pub run_id: String,
    /// Evaluated rule
    pub rule_id: String,
    /// `passed`, `failed` or `error`
    pub status: String,
    /// Fraction of rows that broke the rule
    pub violation_rate: f64,
    /// Human-readable summary of the result
    pub details: String,
    /// Start of the run
    pub run_at: DateTime<Utc>,
}

fn status_of(result: &RuleResult) -> &'static str {
    if result.is_error() {
        "error"
    } else if result.passed {
        "passed"
    } else {
        "failed"
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Report store persisting runs to a SQLite database.
pub struct SqliteReportStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteReportStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteReportStore").finish_non_exhaustive()
    }
}

impl SqliteReportStore {
    /// Opens (creating if needed) a history database and ensures its schema.
    ///
    /// # Errors
    /// Returns a configuration error for malformed connection strings and a
    /// storage error if the database cannot be opened or initialized.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let pool = open_pool(connection_string, OpenMode::ReadWriteCreate).await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and ensures the schema exists.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| DqError::storage_failed("Failed to initialize history schema", e))?;
        }
        Ok(Self { pool })
    }

    /// Returns up to `limit` stored outcomes of one rule, newest first.
    pub async fn rule_history(&self, rule_id: &str, limit: usize) -> Result<Vec<RuleOutcome>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, rule_id, status, violation_rate, details, run_at
            FROM rule_results
            WHERE rule_id = ?
            ORDER BY run_at DESC
            LIMIT ?
            "#,
        )
        .bind(rule_id)
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DqError::storage_failed("Failed to query rule history", e))?;

        rows.iter()
            .map(|row| {
                Ok(RuleOutcome {
                    run_id: row.try_get("run_id").map_err(decode_failed)?,
                    rule_id: row.try_get("rule_id").map_err(decode_failed)?,
                    status: row.try_get("status").map_err(decode_failed)?,
                    violation_rate: row.try_get("violation_rate").map_err(decode_failed)?,
                    details: row.try_get("details").map_err(decode_failed)?,
                    run_at: row.try_get("run_at").map_err(decode_failed)?,
                })
            })
            .collect()
    }

    /// Closes the connection gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn decode_failed(e: sqlx::Error) -> DqError {
    DqError::storage_failed("Failed to decode stored row", e)
}

fn decode_report(row: &SqliteRow) -> Result<AssessmentReport> {
    let json: String = row.try_get("report").map_err(decode_failed)?;
    serde_json::from_str(&json)
        .map_err(|e| DqError::serialization("Failed to decode stored report", e))
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn append(&self, report: &AssessmentReport) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let json = serde_json::to_string(report)
            .map_err(|e| DqError::serialization("Failed to encode report", e))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DqError::storage_failed("Failed to begin transaction", e))?;

        sqlx::query(
            "INSERT INTO assessment_runs (id, dataset, run_at, overall_score, report) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.hyphenated())
        .bind(&report.dataset.name)
        .bind(report.run_at)
        .bind(report.overall_score)
        .bind(json)
        .execute(&mut *tx)
        .await
        .map_err(|e| DqError::storage_failed("Failed to store assessment run", e))?;

        for result in &report.rule_results {
            sqlx::query(
                r#"
                INSERT INTO rule_results
                    (run_id, rule_id, table_name, column_name, rule_kind, status, violation_rate, details, run_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(id.hyphenated())
            .bind(&result.rule_id)
            .bind(&result.table)
            .bind(&result.column)
            .bind(&result.rule_kind)
            .bind(status_of(result))
            .bind(result.violation_rate)
            .bind(&result.details)
            .bind(report.run_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| DqError::storage_failed("Failed to store rule result", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DqError::storage_failed("Failed to commit assessment run", e))?;

        tracing::debug!(
            "Stored run {} for '{}' ({} rule results)",
            id,
            report.dataset.name,
            report.rule_results.len()
        );
        Ok(id)
    }

    async fn recent(&self, dataset: &str, limit: usize) -> Result<Vec<AssessmentReport>> {
        let rows = sqlx::query(
            "SELECT report FROM assessment_runs WHERE dataset = ? ORDER BY run_at DESC LIMIT ?",
        )
        .bind(dataset)
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DqError::storage_failed("Failed to query recent runs", e))?;

        rows.iter().map(decode_report).collect()
    }

    async fn since(&self, since: DateTime<Utc>) -> Result<Vec<AssessmentReport>> {
        let rows =
            sqlx::query("SELECT report FROM assessment_runs WHERE run_at >= ? ORDER BY run_at ASC")
                .bind(since)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DqError::storage_failed("Failed to query runs", e))?;

        rows.iter().map(decode_report).collect()
    }

    async fn score_series(&self, dataset: &str, limit: usize) -> Result<Vec<f64>> {
        let rows = sqlx::query(
            r#"
            SELECT overall_score FROM (
                SELECT overall_score, run_at
                FROM assessment_runs
                WHERE dataset = ?
                ORDER BY run_at DESC
                LIMIT ?
            )
            ORDER BY run_at ASC
            "#,
        )
        .bind(dataset)
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DqError::storage_failed("Failed to query score series", e))?;

        rows.iter()
            .map(|row| row.try_get::<f64, _>("overall_score").map_err(decode_failed))
            .collect()
    }
}
