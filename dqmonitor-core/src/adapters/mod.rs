//! Dataset access for assessment runs.
//!
//! A [`DatasetSource`] materializes tables into [`TableSnapshot`]s. The
//! engine never talks to a source directly: the caller loads a
//! [`DatasetSnapshot`] first and hands it to the assessor, so every
//! component of a run sees the same data version.
//!
//! # Object Safety
//! The trait is object-safe, allowing for dynamic dispatch through
//! `Box<dyn DatasetSource>` or `Arc<dyn DatasetSource>`.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::Result;
use crate::models::{DatasetSnapshot, TableSnapshot};
use crate::quality::ValidationRule;

pub use memory::MemorySource;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSource;

/// Source of table snapshots.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    /// Lists the tables this source can load, sorted by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Loads one complete table.
    ///
    /// # Errors
    /// Returns `TableNotFound` if the table does not exist and
    /// `DatasetUnavailable` if it exists but cannot be read.
    async fn load_table(&self, name: &str) -> Result<TableSnapshot>;

    /// Loads the primary table plus every other table the enabled rules
    /// touch, either as a target or as a referenced table.
    ///
    /// Failure to load the primary table aborts. A secondary table that
    /// cannot be loaded is left out of the snapshot; the rules that need it
    /// then fail individually during evaluation.
    async fn load_snapshot(
        &self,
        primary: &str,
        rules: &[ValidationRule],
    ) -> Result<DatasetSnapshot> {
        let mut snapshot = DatasetSnapshot::new(self.load_table(primary).await?);

        let secondary: BTreeSet<&str> = rules
            .iter()
            .filter(|r| r.enabled)
            .flat_map(|r| [Some(r.target.table.as_str()), r.kind.referenced_table()])
            .flatten()
            .filter(|name| *name != primary)
            .collect();

        for name in secondary {
            match self.load_table(name).await {
                Ok(table) => {
                    tracing::debug!("Loaded related table '{}' ({} rows)", name, table.row_count());
                    snapshot.related.insert(name.to_string(), table);
                }
                Err(e) => {
                    tracing::warn!("Related table '{}' unavailable: {}", name, e);
                }
            }
        }

        Ok(snapshot)
    }
}
