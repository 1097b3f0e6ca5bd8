//! Core engine and collaborators for DQMonitor.
//!
//! This crate takes a read-only dataset snapshot plus a set of validation
//! rules and produces a reproducible quality report: pass/fail per rule,
//! per-column statistics, dimension scores and detected anomalies.
//!
//! # Guarantees
//! - The engine ([`quality`]) is synchronous and performs no I/O
//! - Datasets are read through [`adapters::DatasetSource`] in read-only mode
//! - Reports are persisted only by the caller, through [`history::ReportStore`]
//! - Connection strings are redacted before reaching logs or errors
//!
//! # Architecture
//! - [`models`]: table and dataset snapshots
//! - [`quality`]: profiler, rule evaluator, anomaly detector, scorer and
//!   the assessor that runs them
//! - [`registry`]: caller-owned rule registry handing out immutable rule sets
//! - [`adapters`]: dataset sources (in-memory, SQLite)
//! - [`history`]: report stores and trend summaries

pub mod adapters;
pub mod error;
pub mod history;
pub mod logging;
pub mod models;
pub mod quality;
pub mod registry;

// Re-export commonly used types
pub use adapters::{DatasetSource, MemorySource};
#[cfg(feature = "sqlite")]
pub use adapters::SqliteSource;
pub use error::{DqError, Result};
pub use history::{MemoryReportStore, QualitySummary, ReportStore, summarize};
#[cfg(feature = "sqlite")]
pub use history::SqliteReportStore;
pub use models::{ColumnDef, DataType, DatasetSnapshot, TableSnapshot};
pub use quality::{AssessmentReport, QualityAssessor, QualityConfig, RuleKind, ValidationRule};
pub use registry::{RuleRegistry, RuleSet};
