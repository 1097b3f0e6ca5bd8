//! SQLite dataset source.
//!
//! # Module Structure
//! - `connection`: Connection string validation and pool creation
//! - `type_mapping`: SQLite declared types to [`crate::models::DataType`]
//! - `loading`: Table enumeration and full-table loading
//!
//! All dataset access is read-only (SELECT/PRAGMA only).

pub mod connection;
pub mod loading;
pub mod type_mapping;


use async_trait::async_trait;
use sqlx::SqlitePool;

use super::DatasetSource;
use crate::Result;
use crate::models::TableSnapshot;

pub use connection::{OpenMode, open_pool};
pub use type_mapping::map_sqlite_type;

/// Dataset source reading tables from a SQLite database.
pub struct SqliteSource {
    pool: SqlitePool,
    in_memory: bool,
}

impl std::fmt::Debug for SqliteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSource")
            .field("in_memory", &self.in_memory)
            .finish_non_exhaustive()
    }
}

impl SqliteSource {
    /// Opens a SQLite database read-only.
    ///
    /// # Errors
    /// Returns a configuration error for malformed connection strings and
    /// `DatasetUnavailable` if the database cannot be opened.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let pool = open_pool(connection_string, OpenMode::ReadOnly).await?;
        Ok(Self {
            pool,
            in_memory: connection::is_in_memory(connection_string),
        })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            in_memory: false,
        }
    }

    /// Checks if the source is an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Closes the connection gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DatasetSource for SqliteSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        loading::list_tables(&self.pool).await
    }

    async fn load_table(&self, name: &str) -> Result<TableSnapshot> {
        loading::load_table(&self.pool, name).await
    }
}
