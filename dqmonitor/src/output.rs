//! Plain-text rendering of reports, profiles, summaries and rules.
//!
//! JSON output goes straight through serde; these renderers only exist for
//! the terminal.

use std::fmt::Write;

use dqmonitor_core::QualitySummary;
use dqmonitor_core::quality::{AssessmentReport, ColumnProfile, QualityDimension, RuleKind};
use dqmonitor_core::ValidationRule;
use serde_json::Value;

fn percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn number(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

/// Renders one assessment report.
pub fn render_report(report: &AssessmentReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", report.run_summary());
    let _ = writeln!(out, "Run at: {}", report.run_at.to_rfc3339());

    let _ = writeln!(out, "\nDimension scores:");
    for dimension in QualityDimension::ALL {
        let _ = writeln!(
            out,
            "  {:<13} {:.3}",
            dimension.name(),
            report.dimension_score(dimension)
        );
    }

    if !report.rule_results.is_empty() {
        let _ = writeln!(out, "\nRules:");
        for result in &report.rule_results {
            let status = match (result.is_error(), result.passed) {
                (true, _) => "ERROR",
                (false, true) => "PASS",
                (false, false) => "FAIL",
            };
            let _ = writeln!(
                out,
                "  [{:<5}] {:<28} {}.{}: {}",
                status, result.rule_id, result.table, result.column, result.details
            );
            if !result.samples.is_empty() {
                let _ = writeln!(out, "          samples: {}", result.samples.join(", "));
            }
        }
    }

    for skipped in &report.skipped_profiles {
        let _ = writeln!(out, "  skipped profile {}: {}", skipped.column, skipped.reason);
    }

    if !report.anomalies.is_empty() {
        let _ = writeln!(out, "\nAnomalies:");
        for flag in &report.anomalies {
            let position = flag
                .index
                .map_or_else(String::new, |i| format!(" (row {})", i));
            let _ = writeln!(
                out,
                "  {}{}: {} scored {:.2} by {} (threshold {}, bounds {:.3}..{:.3})",
                flag.subject,
                position,
                flag.value,
                flag.score,
                flag.method,
                flag.threshold,
                flag.lower_bound,
                flag.upper_bound
            );
        }
    }
    out.push('\n');
    out
}

/// Renders column profiles of one table.
pub fn render_profiles(table: &str, profiles: &[ColumnProfile]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", table);
    let _ = writeln!(
        out,
        "{:<20} {:<8} {:>6} {:>8} {:>9} {:>12} {:>12} {:>12} {:>12}",
        "column", "type", "rows", "null%", "distinct", "min", "max", "mean", "std_dev"
    );
    for p in profiles {
        let _ = writeln!(
            out,
            "{:<20} {:<8} {:>6} {:>8.2} {:>9} {:>12} {:>12} {:>12} {:>12}",
            p.column,
            p.inferred_type.to_string(),
            p.row_count,
            p.null_percent,
            p.distinct_count,
            cell(p.min.as_ref()),
            cell(p.max.as_ref()),
            number(p.mean),
            number(p.std_dev)
        );
    }
    out
}

/// Renders a history summary.
pub fn render_summary(summary: &QualitySummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Tables:");
    if summary.tables.is_empty() {
        let _ = writeln!(out, "  no checks in window");
    }
    for t in &summary.tables {
        let _ = writeln!(
            out,
            "  {:<20} {} checks, {} passed, {} failed, {} errors, mean violation {}",
            t.table,
            t.total_checks,
            t.passed_checks,
            t.failed_checks,
            t.errored_checks,
            percent(t.mean_violation_rate)
        );
    }

    let _ = writeln!(out, "\nDaily trend:");
    for point in &summary.trends {
        let _ = writeln!(
            out,
            "  {} {:>4} checks {:>4} passed  mean violation {}",
            point.date,
            point.total_checks,
            point.passed_checks,
            percent(point.mean_violation_rate)
        );
    }

    let _ = writeln!(out, "\nRecent failures:");
    for check in &summary.failed_checks {
        let _ = writeln!(
            out,
            "  {} {}.{} [{}] {} (tolerance {})",
            check.evaluated_at.format("%Y-%m-%d %H:%M"),
            check.table,
            check.column,
            check.rule_id,
            check.details,
            percent(check.tolerance)
        );
    }
    out
}

fn describe_kind(kind: &RuleKind) -> String {
    match kind {
        RuleKind::NotNull | RuleKind::Uniqueness => kind.name().to_string(),
        RuleKind::Format {
            pattern,
            case_insensitive,
        } => format!(
            "format {}{}",
            pattern.as_deref().unwrap_or("<missing pattern>"),
            if *case_insensitive { " (i)" } else { "" }
        ),
        RuleKind::NumericRange { min, max } => format!(
            "range [{}, {}]",
            min.map_or_else(|| "-inf".to_string(), |v| v.to_string()),
            max.map_or_else(|| "inf".to_string(), |v| v.to_string())
        ),
        RuleKind::ReferentialIntegrity {
            reference_table,
            reference_column,
            ..
        } => format!(
            "references {}.{}",
            reference_table.as_deref().unwrap_or("?"),
            reference_column.as_deref().unwrap_or("?")
        ),
        RuleKind::Unsupported { name, .. } => format!("{} (unsupported)", name),
    }
}

/// Renders rule definitions, one per line.
pub fn render_rules(rules: &[&ValidationRule]) -> String {
    let mut out = String::new();
    for rule in rules {
        let _ = writeln!(
            out,
            "{:<28} {:<24} {:<13} tol {:<7} {}{}",
            rule.id,
            format!("{}.{}", rule.target.table, rule.target.column),
            rule.severity.to_string(),
            percent(rule.tolerance),
            describe_kind(&rule.kind),
            if rule.enabled { "" } else { " [disabled]" }
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dqmonitor_core::models::{DatasetSnapshot, TableSnapshot};
    use dqmonitor_core::{QualityAssessor, RuleRegistry};
    use serde_json::json;

    fn report() -> AssessmentReport {
        let table = TableSnapshot::from_json_rows(
            "customers",
            vec![
                json!({"email": "a@x.com", "age": 30}),
                json!({"email": null, "age": 200}),
            ],
        )
        .unwrap();
        let rules = RuleRegistry::with_default_rules().snapshot_for("customers");
        QualityAssessor::with_defaults()
            .assess(&DatasetSnapshot::new(table), &rules, None)
            .unwrap()
    }

    #[test]
    fn test_render_report() {
        let text = render_report(&report());
        assert!(text.starts_with("== customers:"));
        assert!(text.contains("completeness"));
        assert!(text.contains("[FAIL ] customers_age_range"));
        assert!(text.contains("[ERROR] customers_name_not_null"));
        assert!(text.contains("samples: 200"));
    }

    #[test]
    fn test_render_profiles() {
        let report = report();
        let text = render_profiles("customers", &report.profiles);
        assert!(text.contains("email"));
        assert!(text.contains("50.00"));
    }

    #[test]
    fn test_render_rules() {
        let registry = RuleRegistry::with_default_rules();
        let rules: Vec<_> = registry.rules().collect();
        let text = render_rules(&rules);
        assert_eq!(text.lines().count(), 13);
        assert!(text.contains("references customers.id"));
        assert!(text.contains("range [1, 100]"));
    }

    #[test]
    fn test_render_empty_summary() {
        let summary = dqmonitor_core::summarize(&[], chrono::Utc::now(), 5);
        assert!(render_summary(&summary).contains("no checks in window"));
    }
}
