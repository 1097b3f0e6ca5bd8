//! Validation rule definitions.
//!
//! Rules are plain data. The kind of check is a closed enum with one case per
//! implemented check; kinds read from rule files that the evaluator does not
//! implement deserialize into [`RuleKind::Unsupported`] so the run can record
//! them as failed results instead of rejecting the whole rule file.
//!
//! On the wire a kind is a JSON object tagged by `"type"`:
//!
//! ```json
//! { "type": "numeric_range", "min": 0, "max": 120 }
//! ```

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::models::QualityDimension;

/// Severity of a rule, used to weight its contribution to dimension scores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth knowing; weighs least
    Informational,
    /// Default level
    #[default]
    Warning,
    /// Breaks downstream use; weighs most
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Informational => write!(f, "informational"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// The check a rule performs, with its kind-specific parameters.
///
/// Parameters are optional at this level; missing required parameters are
/// reported as `MalformedRuleParameters` when the rule is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// Rows whose value is null or empty violate the rule
    NotNull,
    /// Non-null values must match a regular expression
    Format {
        pattern: Option<String>,
        case_insensitive: bool,
    },
    /// Non-null values must be numbers inside `[min, max]` (inclusive)
    NumericRange { min: Option<f64>, max: Option<f64> },
    /// Non-null values must not repeat
    Uniqueness,
    /// Non-null values must exist in a column of another table
    ReferentialIntegrity {
        reference_table: Option<String>,
        reference_column: Option<String>,
        require_not_null: bool,
    },
    /// A kind the evaluator does not implement
    Unsupported {
        name: String,
        parameters: Map<String, Value>,
    },
}

impl RuleKind {
    /// Creates a format rule kind with case-sensitive matching.
    pub fn format(pattern: impl Into<String>) -> Self {
        RuleKind::Format {
            pattern: Some(pattern.into()),
            case_insensitive: false,
        }
    }

    /// Creates an inclusive numeric range rule kind.
    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        RuleKind::NumericRange { min, max }
    }

    /// Creates a referential-integrity rule kind.
    pub fn foreign_key(table: impl Into<String>, column: impl Into<String>) -> Self {
        RuleKind::ReferentialIntegrity {
            reference_table: Some(table.into()),
            reference_column: Some(column.into()),
            require_not_null: false,
        }
    }

    /// Canonical snake_case name of the kind.
    pub fn name(&self) -> &str {
        match self {
            RuleKind::NotNull => "not_null",
            RuleKind::Format { .. } => "format",
            RuleKind::NumericRange { .. } => "numeric_range",
            RuleKind::Uniqueness => "uniqueness",
            RuleKind::ReferentialIntegrity { .. } => "referential_integrity",
            RuleKind::Unsupported { name, .. } => name,
        }
    }

    /// Quality dimension this kind contributes to.
    ///
    /// Unsupported kinds still map when their name is a known category
    /// (`cross_field`, `business_rule`, `schema_constraint`).
    pub fn dimension(&self) -> Option<QualityDimension> {
        match self {
            RuleKind::NotNull => Some(QualityDimension::Completeness),
            RuleKind::Format { .. } | RuleKind::NumericRange { .. } => {
                Some(QualityDimension::Accuracy)
            }
            RuleKind::Uniqueness => Some(QualityDimension::Consistency),
            RuleKind::ReferentialIntegrity { .. } => Some(QualityDimension::Validity),
            RuleKind::Unsupported { name, .. } => match name.as_str() {
                "cross_field" | "business_rule" => Some(QualityDimension::Consistency),
                "schema_constraint" => Some(QualityDimension::Validity),
                _ => None,
            },
        }
    }

    /// Table referenced by a referential-integrity kind.
    pub fn referenced_table(&self) -> Option<&str> {
        match self {
            RuleKind::ReferentialIntegrity {
                reference_table, ..
            } => reference_table.as_deref(),
            _ => None,
        }
    }
}

/// Maps legacy and hyphenated spellings to the canonical kind name.
fn canonical_kind_name(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase().replace('-', "_");
    match normalized.as_str() {
        "null_check" | "required_field" | "not_null" => "not_null",
        "format_check" | "pattern" | "format" => "format",
        "range_check" | "range" | "numeric_range" => "numeric_range",
        "uniqueness_check" | "unique" | "uniqueness" => "uniqueness",
        "foreign_key_check" | "foreign_key" | "referential_integrity" => "referential_integrity",
        _ => return normalized,
    }
    .to_string()
}

fn optional_string<E: serde::de::Error>(
    params: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, E> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(E::custom(format!(
            "parameter '{}' must be a string, got {}",
            key, other
        ))),
    }
}

fn optional_number<E: serde::de::Error>(
    params: &Map<String, Value>,
    key: &str,
) -> Result<Option<f64>, E> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(E::custom(format!(
            "parameter '{}' must be a number, got {}",
            key, other
        ))),
    }
}

fn flag<E: serde::de::Error>(params: &Map<String, Value>, key: &str) -> Result<bool, E> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(E::custom(format!(
            "parameter '{}' must be a boolean, got {}",
            key, other
        ))),
    }
}

impl<'de> Deserialize<'de> for RuleKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut params = match Value::deserialize(deserializer)? {
            Value::Object(map) => map,
            other => {
                return Err(D::Error::custom(format!(
                    "rule kind must be an object, got {}",
                    other
                )));
            }
        };
        let raw_name = match params.remove("type") {
            Some(Value::String(name)) => name,
            _ => return Err(D::Error::missing_field("type")),
        };

        let kind = match canonical_kind_name(&raw_name).as_str() {
            "not_null" => RuleKind::NotNull,
            "format" => RuleKind::Format {
                pattern: optional_string::<D::Error>(&params, "pattern")?,
                case_insensitive: flag::<D::Error>(&params, "case_insensitive")?,
            },
            "numeric_range" => RuleKind::NumericRange {
                min: optional_number::<D::Error>(&params, "min")?,
                max: optional_number::<D::Error>(&params, "max")?,
            },
            "uniqueness" => RuleKind::Uniqueness,
            "referential_integrity" => RuleKind::ReferentialIntegrity {
                reference_table: optional_string::<D::Error>(&params, "reference_table")?,
                reference_column: optional_string::<D::Error>(&params, "reference_column")?,
                require_not_null: flag::<D::Error>(&params, "require_not_null")?,
            },
            name => RuleKind::Unsupported {
                name: name.to_string(),
                parameters: params,
            },
        };
        Ok(kind)
    }
}

impl Serialize for RuleKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(self.name().to_string()));

        let mut put = |key: &str, value: Value| {
            if !value.is_null() {
                map.insert(key.to_string(), value);
            }
        };
        match self {
            RuleKind::NotNull | RuleKind::Uniqueness => {}
            RuleKind::Format {
                pattern,
                case_insensitive,
            } => {
                put("pattern", pattern.clone().map_or(Value::Null, Value::String));
                if *case_insensitive {
                    put("case_insensitive", Value::Bool(true));
                }
            }
            RuleKind::NumericRange { min, max } => {
                put("min", min.map_or(Value::Null, Value::from));
                put("max", max.map_or(Value::Null, Value::from));
            }
            RuleKind::ReferentialIntegrity {
                reference_table,
                reference_column,
                require_not_null,
            } => {
                put(
                    "reference_table",
                    reference_table.clone().map_or(Value::Null, Value::String),
                );
                put(
                    "reference_column",
                    reference_column.clone().map_or(Value::Null, Value::String),
                );
                if *require_not_null {
                    put("require_not_null", Value::Bool(true));
                }
            }
            RuleKind::Unsupported { parameters, .. } => {
                for (key, value) in parameters {
                    put(key, value.clone());
                }
            }
        }

        map.serialize(serializer)
    }
}

/// Table and column a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleTarget {
    /// Table name
    pub table: String,
    /// Column name within the table
    pub column: String,
}

fn default_enabled() -> bool {
    true
}

/// Immutable validation rule definition.
///
/// Rules are replaced as a whole through the registry; there are no partial
/// updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    /// Unique rule id
    pub id: String,
    /// Where the rule applies
    pub target: RuleTarget,
    /// The check and its parameters
    pub kind: RuleKind,
    /// Weight of the rule in dimension scores
    #[serde(default)]
    pub severity: Severity,
    /// Highest violation rate (0.0-1.0) at which the rule still passes
    #[serde(default)]
    pub tolerance: f64,
    /// Disabled rules stay registered but are never evaluated
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Free-form note for humans
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ValidationRule {
    /// Creates an enabled warning-level rule with zero tolerance.
    pub fn new(
        id: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        kind: RuleKind,
    ) -> Self {
        Self {
            id: id.into(),
            target: RuleTarget {
                table: table.into(),
                column: column.into(),
            },
            kind,
            severity: Severity::default(),
            tolerance: 0.0,
            enabled: true,
            description: None,
        }
    }

    /// Builder method to set severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Builder method to set the tolerated violation rate.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        if !(0.0..=1.0).contains(&tolerance) {
            tracing::warn!(
                "tolerance {} for rule '{}' clamped to valid range [0.0, 1.0]",
                tolerance,
                self.id
            );
        }
        self.tolerance = if tolerance.is_nan() {
            0.0
        } else {
            tolerance.clamp(0.0, 1.0)
        };
        self
    }

    /// Builder method to enable or disable the rule.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
