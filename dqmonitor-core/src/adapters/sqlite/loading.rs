//! Table enumeration and full-table loading.
//!
//! Columns come from `PRAGMA table_info`, rows from a full `SELECT *`. SQLite
//! is dynamically typed, so every cell is decoded by its own storage class;
//! BLOBs become `base64:` strings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value as JsonValue};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, TypeInfo, ValueRef};

use super::type_mapping::map_sqlite_type;
use crate::Result;
use crate::error::DqError;
use crate::models::{ColumnDef, TableSnapshot};

/// Lists user tables, sorted by name.
pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let tables_query = r#"
        SELECT name
        FROM sqlite_master
        WHERE type = 'table'
        AND name NOT LIKE 'sqlite_%'
        ORDER BY name
    "#;

    let rows = sqlx::query(tables_query)
        .fetch_all(pool)
        .await
        .map_err(|e| DqError::dataset_unavailable("Failed to enumerate tables", e))?;

    rows.iter()
        .map(|row| {
            row.try_get::<String, _>("name")
                .map_err(|e| DqError::dataset_unavailable("Failed to parse table name", e))
        })
        .collect()
}

/// Loads column definitions for a table.
///
/// # Errors
/// Returns `TableNotFound` when the table has no columns (does not exist).
pub async fn load_columns(pool: &SqlitePool, table: &str) -> Result<Vec<ColumnDef>> {
    let columns_query = format!("PRAGMA table_info('{}')", table.replace('\'', "''"));

    let rows = sqlx::query(&columns_query)
        .fetch_all(pool)
        .await
        .map_err(|e| {
            DqError::dataset_unavailable(
                format!("Failed to collect columns for table '{}'", table),
                e,
            )
        })?;

    if rows.is_empty() {
        return Err(DqError::table_not_found(table));
    }

    let columns = rows
        .iter()
        .map(|row| column_def(row, table))
        .collect::<Result<Vec<_>>>()?;

    Ok(columns)
}

fn column_def(row: &SqliteRow, table: &str) -> Result<ColumnDef> {
    let field_error = |e: sqlx::Error| {
        DqError::dataset_unavailable(format!("Unreadable column metadata for table '{}'", table), e)
    };
    let name: String = row.try_get("name").map_err(field_error)?;
    let data_type: String = row.try_get("type").map_err(field_error)?;
    let notnull: i32 = row.try_get("notnull").map_err(field_error)?;
    let pk: i32 = row.try_get("pk").map_err(field_error)?;

    // An empty declared type carries no information; leave it to sampling
    let declared_type = if data_type.trim().is_empty() {
        None
    } else {
        Some(map_sqlite_type(&data_type))
    };

    Ok(ColumnDef {
        name,
        declared_type,
        nullable: notnull == 0 && pk == 0,
    })
}

/// Loads a complete table snapshot.
pub async fn load_table(pool: &SqlitePool, table: &str) -> Result<TableSnapshot> {
    let columns = load_columns(pool, table).await?;

    let query = format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""));
    let rows = sqlx::query(&query).fetch_all(pool).await.map_err(|e| {
        DqError::dataset_unavailable(format!("Failed to read rows from table '{}'", table), e)
    })?;

    let rows = rows
        .iter()
        .map(|row| row_to_json(row, &columns))
        .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
        .map_err(|e| {
            DqError::dataset_unavailable(format!("Failed to decode a row of table '{}'", table), e)
        })?;

    tracing::debug!(
        "Loaded table '{}' with {} columns and {} rows",
        table,
        columns.len(),
        rows.len()
    );

    Ok(TableSnapshot::new(table, columns, rows))
}

/// Converts a database row to a JSON object keyed by column name.
fn row_to_json(
    row: &SqliteRow,
    columns: &[ColumnDef],
) -> std::result::Result<Map<String, JsonValue>, sqlx::Error> {
    columns
        .iter()
        .map(|column| {
            extract_column_value(row, &column.name).map(|value| (column.name.clone(), value))
        })
        .collect()
}

/// Decodes one cell according to its storage class.
///
/// SQLite stores each value with its own class regardless of the declared
/// column type, so the runtime class decides the JSON shape. Only SQL NULL
/// becomes JSON null: text that is not valid UTF-8 is decoded lossily and
/// infinite reals are kept as `inf`/`-inf` strings.
fn extract_column_value(
    row: &SqliteRow,
    column_name: &str,
) -> std::result::Result<JsonValue, sqlx::Error> {
    let raw = row.try_get_raw(column_name)?;
    if raw.is_null() {
        return Ok(JsonValue::Null);
    }

    let value = match raw.type_info().name() {
        "INTEGER" => JsonValue::from(row.try_get::<i64, _>(column_name)?),
        "REAL" => {
            let real = row.try_get::<f64, _>(column_name)?;
            serde_json::Number::from_f64(real)
                .map_or_else(|| JsonValue::String(real.to_string()), JsonValue::Number)
        }
        "BLOB" => {
            let bytes = row.try_get::<Vec<u8>, _>(column_name)?;
            JsonValue::String(format!("base64:{}", STANDARD.encode(bytes)))
        }
        _ => {
            let bytes = row.try_get::<Vec<u8>, _>(column_name)?;
            JsonValue::String(String::from_utf8_lossy(&bytes).into_owned())
        }
    };
    Ok(value)
}
