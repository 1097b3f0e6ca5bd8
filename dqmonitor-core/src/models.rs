//! Dataset snapshot models.
//!
//! A run reads one [`DatasetSnapshot`]: the primary table plus any tables
//! referenced by referential-integrity rules. Rows are JSON objects keyed by
//! column name, the same representation the SQLite adapter produces. A key
//! missing from a row is read as JSON null.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DqError;
use crate::Result;

/// Declared column type, independent of the storage engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Character data
    Text,
    /// Whole numbers
    Integer,
    /// Floating point or decimal numbers
    Float,
    /// Boolean flags
    Boolean,
    /// Calendar date
    Date,
    /// Date with time of day
    DateTime,
    /// Raw bytes
    Binary,
    /// Engine-specific type name with no mapping
    Other(String),
}

impl DataType {
    /// Returns true for integer and floating point types.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Text => write!(f, "TEXT"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Float => write!(f, "REAL"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Date => write!(f, "DATE"),
            DataType::DateTime => write!(f, "DATETIME"),
            DataType::Binary => write!(f, "BLOB"),
            DataType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Column definition as resolved from the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name as it appears in each row
    pub name: String,
    /// Declared type; `None` means the type is inferred from values
    pub declared_type: Option<DataType>,
    /// Whether the source allows nulls in this column
    pub nullable: bool,
}

impl ColumnDef {
    /// Creates a nullable column with a declared type.
    pub fn new(name: impl Into<String>, declared_type: DataType) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(declared_type),
            nullable: true,
        }
    }

    /// Creates a nullable column whose type is inferred from its values.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            nullable: true,
        }
    }

    /// Builder method to set nullability.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Immutable materialized view of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Table name
    pub name: String,
    /// Column definitions in source order
    pub columns: Vec<ColumnDef>,
    /// One JSON object per row, keyed by column name
    pub rows: Vec<Map<String, Value>>,
}

impl TableSnapshot {
    /// Creates a snapshot from column definitions and rows.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
        rows: Vec<Map<String, Value>>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Builds a snapshot from JSON object rows, deriving untyped columns
    /// from the keys in first-seen order.
    ///
    /// Non-object rows are rejected.
    pub fn from_json_rows(name: impl Into<String>, rows: Vec<Value>) -> Result<Self> {
        let name = name.into();
        let mut columns: Vec<ColumnDef> = Vec::new();
        let mut objects = Vec::with_capacity(rows.len());

        for (index, row) in rows.into_iter().enumerate() {
            let Value::Object(obj) = row else {
                return Err(DqError::configuration(format!(
                    "Row {} of table '{}' is not a JSON object",
                    index, name
                )));
            };
            for key in obj.keys() {
                if !columns.iter().any(|c| &c.name == key) {
                    columns.push(ColumnDef::untyped(key.clone()));
                }
            }
            objects.push(obj);
        }

        Ok(Self::new(name, columns, objects))
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up a column definition by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns every cell of a column, one per row, in row order.
    ///
    /// # Errors
    /// Returns `ColumnNotFound` if the column is not part of the table.
    pub fn column_values(&self, name: &str) -> Result<Vec<&Value>> {
        if self.column(name).is_none() {
            return Err(DqError::column_not_found(&self.name, name));
        }
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(name).unwrap_or(&Value::Null))
            .collect())
    }
}

/// The read-only input of one assessment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    /// The table under assessment
    pub primary: TableSnapshot,
    /// Tables referenced by referential-integrity rules, keyed by name
    pub related: BTreeMap<String, TableSnapshot>,
}

impl DatasetSnapshot {
    /// Creates a snapshot with no related tables.
    pub fn new(primary: TableSnapshot) -> Self {
        Self {
            primary,
            related: BTreeMap::new(),
        }
    }

    /// Builder method to attach a related table.
    pub fn with_related(mut self, table: TableSnapshot) -> Self {
        self.related.insert(table.name.clone(), table);
        self
    }

    /// Name of the assessed dataset (the primary table).
    pub fn name(&self) -> &str {
        &self.primary.name
    }

    /// Resolves a table by name, primary first.
    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        if self.primary.name == name {
            Some(&self.primary)
        } else {
            self.related.get(name)
        }
    }
}
