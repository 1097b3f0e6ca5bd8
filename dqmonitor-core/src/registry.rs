//! Validation rule registry.
//!
//! The registry is owned by the caller. Assessments never read it directly;
//! they receive a [`RuleSet`], an immutable snapshot taken with
//! [`RuleRegistry::snapshot_for`], so the registry can change between runs
//! without affecting a run in progress. Callers sharing a registry across
//! threads wrap it in their own lock.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use crate::Result;
use crate::error::DqError;
use crate::quality::{RuleKind, Severity, ValidationRule};

/// Immutable, cheaply clonable snapshot of the rules for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Arc<[ValidationRule]>,
}

impl RuleSet {
    /// Returns the rules as a slice.
    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }
}

impl Deref for RuleSet {
    type Target = [ValidationRule];

    fn deref(&self) -> &Self::Target {
        &self.rules
    }
}

impl From<Vec<ValidationRule>> for RuleSet {
    fn from(rules: Vec<ValidationRule>) -> Self {
        Self {
            rules: rules.into(),
        }
    }
}

/// Rule definitions keyed by rule id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleRegistry {
    rules: BTreeMap<String, ValidationRule>,
}

impl RuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new rule. Out-of-range tolerances are clamped to
    /// `[0.0, 1.0]`.
    ///
    /// # Errors
    /// Returns a configuration error if a rule with the same id exists.
    pub fn register(&mut self, rule: ValidationRule) -> Result<()> {
        if self.rules.contains_key(&rule.id) {
            return Err(DqError::configuration(format!(
                "Rule '{}' is already registered",
                rule.id
            )));
        }
        self.rules.insert(rule.id.clone(), normalized(rule));
        Ok(())
    }

    /// Replaces a rule as a whole, returning the previous definition.
    ///
    /// Registers the rule if its id is new.
    pub fn replace(&mut self, rule: ValidationRule) -> Option<ValidationRule> {
        self.rules.insert(rule.id.clone(), normalized(rule))
    }

    /// Disables a rule. Returns false if the id is unknown.
    pub fn disable(&mut self, id: &str) -> bool {
        self.set_enabled(id, false)
    }

    /// Enables a rule. Returns false if the id is unknown.
    pub fn enable(&mut self, id: &str) -> bool {
        self.set_enabled(id, true)
    }

    fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.rules.get(id) {
            Some(rule) => {
                let updated = rule.clone().with_enabled(enabled);
                self.rules.insert(id.to_string(), updated);
                true
            }
            None => false,
        }
    }

    /// Looks up a rule by id.
    pub fn get(&self, id: &str) -> Option<&ValidationRule> {
        self.rules.get(id)
    }

    /// Removes a rule, returning its definition.
    pub fn remove(&mut self, id: &str) -> Option<ValidationRule> {
        self.rules.remove(id)
    }

    /// Number of registered rules, disabled ones included.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rule is registered.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates over every rule in id order, enabled or not.
    pub fn rules(&self) -> impl Iterator<Item = &ValidationRule> {
        self.rules.values()
    }

    /// Takes a snapshot of the enabled rules targeting `table`, ordered by id.
    pub fn snapshot_for(&self, table: &str) -> RuleSet {
        self.rules
            .values()
            .filter(|rule| rule.enabled && rule.target.table == table)
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Takes a snapshot of every enabled rule, ordered by id.
    pub fn snapshot(&self) -> RuleSet {
        self.rules
            .values()
            .filter(|rule| rule.enabled)
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Loads rule definitions from a JSON array.
    ///
    /// # Errors
    /// Returns an I/O or serialization error if the file cannot be read or
    /// parsed, and a configuration error on duplicate ids.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DqError::io(format!("Failed to read rules file {}", path.display()), e)
        })?;
        let rules: Vec<ValidationRule> = serde_json::from_str(&content).map_err(|e| {
            DqError::serialization(format!("Failed to parse rules file {}", path.display()), e)
        })?;

        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule)?;
        }
        tracing::debug!(
            "Loaded {} rules from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Writes every rule to a JSON array, ordered by id.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let rules: Vec<&ValidationRule> = self.rules.values().collect();
        let content = serde_json::to_string_pretty(&rules)
            .map_err(|e| DqError::serialization("Failed to encode rules", e))?;
        std::fs::write(path, content).map_err(|e| {
            DqError::io(format!("Failed to write rules file {}", path.display()), e)
        })
    }

    /// Builds the stock catalogue for the sample customers, products and
    /// orders schema.
    pub fn with_default_rules() -> Self {
        let email_pattern = r"^[\w\.-]+@[\w\.-]+\.[a-zA-Z]{2,}$";
        let phone_pattern = r"^\+?[1-9]\d{1,14}$";

        let rules = [
            ValidationRule::new("customers_name_not_null", "customers", "name", RuleKind::NotNull)
                .with_tolerance(0.05),
            ValidationRule::new("customers_email_not_null", "customers", "email", RuleKind::NotNull)
                .with_tolerance(0.05),
            ValidationRule::new("products_name_not_null", "products", "name", RuleKind::NotNull)
                .with_tolerance(0.02),
            ValidationRule::new(
                "products_category_not_null",
                "products",
                "category",
                RuleKind::NotNull,
            )
            .with_tolerance(0.03),
            ValidationRule::new(
                "customers_email_format",
                "customers",
                "email",
                RuleKind::format(email_pattern),
            )
            .with_tolerance(0.10),
            ValidationRule::new(
                "customers_phone_format",
                "customers",
                "phone",
                RuleKind::format(phone_pattern),
            )
            .with_tolerance(0.15)
            .with_severity(Severity::Informational),
            ValidationRule::new(
                "customers_age_range",
                "customers",
                "age",
                RuleKind::range(Some(0.0), Some(120.0)),
            )
            .with_tolerance(0.05),
            ValidationRule::new(
                "products_price_range",
                "products",
                "price",
                RuleKind::range(Some(0.0), Some(10_000.0)),
            )
            .with_tolerance(0.05),
            ValidationRule::new(
                "products_stock_range",
                "products",
                "stock",
                RuleKind::range(Some(0.0), Some(1_000.0)),
            )
            .with_tolerance(0.10),
            ValidationRule::new(
                "orders_quantity_range",
                "orders",
                "quantity",
                RuleKind::range(Some(1.0), Some(100.0)),
            )
            .with_tolerance(0.05),
            ValidationRule::new(
                "customers_email_unique",
                "customers",
                "email",
                RuleKind::Uniqueness,
            )
            .with_tolerance(0.01),
            ValidationRule::new(
                "orders_customer_fk",
                "orders",
                "customer_id",
                RuleKind::foreign_key("customers", "id"),
            )
            .with_severity(Severity::Critical),
            ValidationRule::new(
                "orders_product_fk",
                "orders",
                "product_id",
                RuleKind::foreign_key("products", "id"),
            )
            .with_severity(Severity::Critical),
        ];

        Self {
            rules: rules
                .into_iter()
                .map(|rule| (rule.id.clone(), rule))
                .collect(),
        }
    }
}

fn normalized(rule: ValidationRule) -> ValidationRule {
    let tolerance = rule.tolerance;
    rule.with_tolerance(tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, table: &str) -> ValidationRule {
        ValidationRule::new(id, table, "email", RuleKind::NotNull)
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = RuleRegistry::new();
        registry.register(rule("a", "customers")).unwrap();
        let err = registry.register(rule("a", "orders")).unwrap_err();
        assert!(matches!(err, DqError::Configuration { .. }));
        assert_eq!(registry.get("a").unwrap().target.table, "customers");
    }

    #[test]
    fn test_replace_swaps_whole_rule() {
        let mut registry = RuleRegistry::new();
        registry.register(rule("a", "customers")).unwrap();
        let previous = registry.replace(
            ValidationRule::new("a", "customers", "phone", RuleKind::format(r"^\d+$"))
                .with_tolerance(0.2),
        );
        assert_eq!(previous.unwrap().target.column, "email");
        let current = registry.get("a").unwrap();
        assert_eq!(current.target.column, "phone");
        assert!((current.tolerance - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_for_filters_and_orders() {
        let mut registry = RuleRegistry::new();
        registry.register(rule("c", "customers")).unwrap();
        registry.register(rule("a", "customers")).unwrap();
        registry.register(rule("b", "orders")).unwrap();
        registry.register(rule("d", "customers")).unwrap();
        assert!(registry.disable("d"));
        assert!(!registry.disable("missing"));

        let set = registry.snapshot_for("customers");
        let ids: Vec<&str> = set.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        // Later changes do not reach an existing snapshot
        registry.remove("a");
        assert!(registry.enable("d"));
        assert_eq!(set.len(), 2);
        assert_eq!(registry.snapshot_for("customers").len(), 2);
        assert_eq!(registry.snapshot().len(), 3);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");

        let registry = RuleRegistry::with_default_rules();
        registry.to_json_file(&path).unwrap();
        let loaded = RuleRegistry::from_json_file(&path).unwrap();
        assert_eq!(loaded, registry);
    }

    #[test]
    fn test_from_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = RuleRegistry::from_json_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(DqError::Io { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(
            RuleRegistry::from_json_file(&bad),
            Err(DqError::Serialization { .. })
        ));

        let dup = dir.path().join("dup.json");
        let rules = vec![rule("a", "customers"), rule("a", "orders")];
        std::fs::write(&dup, serde_json::to_string(&rules).unwrap()).unwrap();
        assert!(matches!(
            RuleRegistry::from_json_file(&dup),
            Err(DqError::Configuration { .. })
        ));
    }

    #[test]
    fn test_from_json_file_clamps_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let mut low = serde_json::to_value(rule("low", "customers")).unwrap();
        low["tolerance"] = serde_json::json!(-0.5);
        let mut high = serde_json::to_value(rule("high", "customers")).unwrap();
        high["tolerance"] = serde_json::json!(3.0);
        std::fs::write(&path, serde_json::to_string(&vec![low, high]).unwrap()).unwrap();

        let registry = RuleRegistry::from_json_file(&path).unwrap();
        assert_eq!(registry.get("low").unwrap().tolerance, 0.0);
        assert_eq!(registry.get("high").unwrap().tolerance, 1.0);

        let mut row = serde_json::Map::new();
        row.insert("email".to_string(), serde_json::json!("a@x.com"));
        let snapshot = crate::models::DatasetSnapshot::new(crate::models::TableSnapshot::new(
            "customers",
            vec![crate::models::ColumnDef::untyped("email")],
            vec![row],
        ));
        let result =
            crate::quality::evaluate_rule(registry.get("low").unwrap(), &snapshot, 5, chrono::Utc::now())
                .unwrap();
        assert!(result.passed);
    }

    #[test]
    fn test_default_catalogue() {
        let registry = RuleRegistry::with_default_rules();
        assert_eq!(registry.len(), 13);
        assert_eq!(registry.snapshot_for("customers").len(), 6);
        assert_eq!(registry.snapshot_for("products").len(), 4);
        assert_eq!(registry.snapshot_for("orders").len(), 3);

        let fk = registry.get("orders_customer_fk").unwrap();
        assert_eq!(fk.kind.referenced_table(), Some("customers"));
        assert_eq!(fk.tolerance, 0.0);
        let email = registry.get("customers_email_format").unwrap();
        assert!((email.tolerance - 0.10).abs() < 1e-9);
    }
}
