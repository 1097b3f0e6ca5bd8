//! SQLite connection handling.
//!
//! # Accepted locations
//! - `sqlite:` URLs such as `sqlite:///var/data/shop.db` or `sqlite://./shop.db`
//! - Plain paths ending in `.db`, `.sqlite` or `.sqlite3`
//! - In-memory: `sqlite::memory:`, `:memory:` or a URL with `mode=memory`
//!
//! Assessed datasets are opened read-only. The history store opens its
//! database read-write and creates the file if needed.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use url::Url;

use crate::Result;
use crate::error::{DqError, redact_database_url};

const FILE_EXTENSIONS: [&str; 3] = [".db", ".sqlite", ".sqlite3"];

/// How a SQLite database is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only; the database must exist
    ReadOnly,
    /// Read-write; the database file is created if missing
    ReadWriteCreate,
}

/// Where a connection string points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    /// A private in-memory database
    Memory,
    /// A `sqlite:` URL, kept as given
    Url(String),
    /// A bare filesystem path
    Path(String),
}

impl SqliteLocation {
    /// Classifies a connection string.
    ///
    /// # Errors
    /// Returns a configuration error for anything that is neither a
    /// `sqlite:` URL, a database file path nor `:memory:`.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let s = connection_string.trim();
        if s == ":memory:" || (s.starts_with("sqlite:") && is_in_memory(s)) {
            return Ok(Self::Memory);
        }

        if s.starts_with("sqlite:") {
            // `sqlite://./relative.db` is not a valid URL but sqlx accepts it
            return match Url::parse(s) {
                Ok(url) if url.scheme() != "sqlite" => Err(DqError::configuration(
                    "Connection string must use the sqlite:// scheme",
                )),
                Ok(_) => Ok(Self::Url(s.to_string())),
                Err(_) if s.starts_with("sqlite://") => Ok(Self::Url(s.to_string())),
                Err(e) => Err(DqError::configuration(format!(
                    "Malformed SQLite URL: {}",
                    e
                ))),
            };
        }

        if FILE_EXTENSIONS.iter().any(|ext| s.ends_with(ext)) {
            return Ok(Self::Path(s.to_string()));
        }

        Err(DqError::configuration(
            "Unrecognized SQLite location: expected a sqlite:// URL, a .db/.sqlite/.sqlite3 path or :memory:",
        ))
    }

    /// Renders the location as a URL sqlx understands.
    pub fn to_url(&self) -> String {
        match self {
            Self::Memory => "sqlite::memory:".to_string(),
            Self::Url(url) => url.clone(),
            Self::Path(path) => format!("sqlite://{}", path),
        }
    }
}

/// Returns true for in-memory connection strings.
pub fn is_in_memory(connection_string: &str) -> bool {
    connection_string.contains(":memory:") || connection_string.contains("mode=memory")
}

/// Opens a single-connection SQLite pool.
///
/// # Errors
/// Returns a configuration error for malformed connection strings. Failure
/// to open the database maps to `DatasetUnavailable` in read-only mode and
/// to `Storage` in read-write mode.
pub async fn open_pool(connection_string: &str, mode: OpenMode) -> Result<SqlitePool> {
    let url = SqliteLocation::parse(connection_string)?.to_url();

    let base = SqliteConnectOptions::from_str(&url)
        .map_err(|e| DqError::configuration(format!("Invalid SQLite connection string: {}", e)))?;
    let options = match mode {
        OpenMode::ReadOnly => base.read_only(true),
        OpenMode::ReadWriteCreate => base.create_if_missing(true),
    };

    // In-memory databases are per connection, so the pool holds exactly one
    SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await
        .map_err(|e| {
            let context = format!("Failed to open SQLite database {}", redact_database_url(&url));
            match mode {
                OpenMode::ReadOnly => DqError::dataset_unavailable(context, e),
                OpenMode::ReadWriteCreate => DqError::storage_failed(context, e),
            }
        })
}
