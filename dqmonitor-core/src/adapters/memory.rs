//! In-memory dataset source.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::DatasetSource;
use crate::Result;
use crate::error::DqError;
use crate::models::TableSnapshot;

/// Dataset source backed by tables held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: BTreeMap<String, TableSnapshot>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add a table.
    pub fn with_table(mut self, table: TableSnapshot) -> Self {
        self.insert(table);
        self
    }

    /// Adds or replaces a table.
    pub fn insert(&mut self, table: TableSnapshot) {
        self.tables.insert(table.name.clone(), table);
    }
}

#[async_trait]
impl DatasetSource for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn load_table(&self, name: &str) -> Result<TableSnapshot> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| DqError::table_not_found(name))
    }
}
