//! SQLite declared-type mapping.
//!
//! SQLite determines type affinity from declared type names:
//! 1. Contains "INT" -> INTEGER affinity
//! 2. Contains "CHAR", "CLOB", or "TEXT" -> TEXT affinity
//! 3. Contains "BLOB" or no type specified -> BLOB affinity
//! 4. Contains "REAL", "FLOA", or "DOUB" -> REAL affinity
//! 5. Otherwise -> NUMERIC affinity
//!
//! Common names with NUMERIC affinity (dates, booleans, decimals) are mapped
//! to their intended type before falling back to [`DataType::Other`].

use crate::models::DataType;

/// Maps a SQLite declared column type to a [`DataType`].
///
/// # Example
/// ```rust
/// use dqmonitor_core::adapters::sqlite::map_sqlite_type;
/// use dqmonitor_core::models::DataType;
///
/// assert_eq!(map_sqlite_type("VARCHAR(255)"), DataType::Text);
/// assert_eq!(map_sqlite_type("bigint"), DataType::Integer);
/// ```
pub fn map_sqlite_type(sqlite_type: &str) -> DataType {
    let type_upper = sqlite_type.trim().to_uppercase();
    // Drop any length or precision suffix, e.g. VARCHAR(255) or DECIMAL(10,2)
    let base_type = type_upper
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    if base_type.is_empty() {
        return DataType::Binary;
    }
    if base_type.contains("INT") {
        return DataType::Integer;
    }
    if base_type.contains("CHAR") || base_type.contains("CLOB") || base_type.contains("TEXT") {
        return DataType::Text;
    }
    if base_type.contains("BLOB") {
        return DataType::Binary;
    }
    if base_type.contains("REAL") || base_type.contains("FLOA") || base_type.contains("DOUB") {
        return DataType::Float;
    }

    match base_type.as_str() {
        "BOOLEAN" | "BOOL" => DataType::Boolean,
        "DATE" => DataType::Date,
        "DATETIME" | "TIMESTAMP" => DataType::DateTime,
        "NUMERIC" | "DECIMAL" | "NUMBER" => DataType::Float,
        "STRING" | "UUID" | "GUID" | "JSON" => DataType::Text,
        _ => DataType::Other(base_type),
    }
}
