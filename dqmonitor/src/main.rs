//! Data quality monitoring tool.
//!
//! This binary loads tables from a SQLite database, runs validation rules,
//! profiling and anomaly detection over them, and optionally appends the
//! resulting reports to a history database for trend summaries.
//!
//! # Guarantees
//! - Assessed databases are opened read-only
//! - Connection strings are redacted before they reach logs
//! - No network access beyond the databases named on the command line

mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dqmonitor_core::error::redact_database_url;
use dqmonitor_core::logging::init_logging;
use dqmonitor_core::{
    DatasetSource, QualityAssessor, QualityConfig, ReportStore, RuleRegistry, SqliteReportStore,
    SqliteSource, summarize,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "dqmonitor")]
#[command(about = "Data quality monitoring tool")]
#[command(version)]
#[command(long_about = "
DQMonitor - rule-based data quality assessment

Runs validation rules (not-null, format, numeric range, uniqueness,
referential integrity) against database tables, profiles every column,
scores completeness, accuracy, consistency and validity, and flags
statistical anomalies in column values and in the score history.

EXAMPLES:
  dqmonitor run --database shop.db --default-rules
  dqmonitor run --database shop.db --table orders --rules rules.json --history-db history.db
  dqmonitor profile --database shop.db --table customers
  dqmonitor summary --history-db history.db --days 7
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assess tables and print the reports
    Run(RunArgs),
    /// Profile the columns of one table
    Profile(ProfileArgs),
    /// Summarize stored assessment history
    Summary(SummaryArgs),
    /// List rule definitions
    Rules(RulesArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable tables
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Args, Debug)]
struct RuleSource {
    /// Rule definitions file
    #[arg(long, help = "JSON file with rule definitions")]
    rules: Option<PathBuf>,

    /// Use the built-in rule catalogue
    #[arg(
        long,
        conflicts_with = "rules",
        help = "Use the built-in customers/products/orders rules"
    )]
    default_rules: bool,
}

impl RuleSource {
    fn load(&self) -> anyhow::Result<RuleRegistry> {
        match (&self.rules, self.default_rules) {
            (Some(path), _) => RuleRegistry::from_json_file(path)
                .with_context(|| format!("Failed to load rules from {}", path.display())),
            (None, true) => Ok(RuleRegistry::with_default_rules()),
            (None, false) => bail!("Either --rules <file> or --default-rules is required"),
        }
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Database to assess
    #[arg(
        long,
        env = "DQMONITOR_DATABASE_URL",
        help = "Database connection string (credentials will be sanitized in logs)"
    )]
    database: String,

    /// Tables to assess
    #[arg(
        long = "table",
        help = "Table to assess; repeat for several, omit to assess every table"
    )]
    tables: Vec<String>,

    #[command(flatten)]
    rule_source: RuleSource,

    /// History database
    #[arg(
        long,
        env = "DQMONITOR_HISTORY_DB",
        help = "SQLite database to append reports to and read score history from"
    )]
    history_db: Option<String>,

    /// Number of past runs used as the anomaly baseline
    #[arg(long = "history", default_value = "30")]
    history_runs: usize,

    /// Engine configuration
    #[arg(long, help = "JSON file with quality configuration")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[arg(long, env = "DQMONITOR_DATABASE_URL", help = "Database connection string")]
    database: String,

    #[arg(long, help = "Table to profile")]
    table: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct SummaryArgs {
    #[arg(long, env = "DQMONITOR_HISTORY_DB", help = "History database")]
    history_db: String,

    /// Window for per-table counts and trends, in days
    #[arg(long, default_value = "7")]
    days: u32,

    /// Number of recent failed checks to list
    #[arg(long, default_value = "10")]
    failed: usize,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct RulesArgs {
    #[command(flatten)]
    rule_source: RuleSource,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    match &cli.command {
        Command::Run(args) => run(args).await,
        Command::Profile(args) => profile(args).await,
        Command::Summary(args) => summary(args).await,
        Command::Rules(args) => rules(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<QualityConfig> {
    match path {
        Some(path) => QualityConfig::from_json_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(QualityConfig::default()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Assesses the requested tables, appending reports to history if configured.
async fn run(args: &RunArgs) -> anyhow::Result<()> {
    let registry = args.rule_source.load()?;
    let assessor = QualityAssessor::new(load_config(args.config.as_deref())?);

    info!("Target: {}", redact_database_url(&args.database));
    let source = SqliteSource::connect(&args.database)
        .await
        .context("Failed to open dataset database")?;

    let store = match &args.history_db {
        Some(path) => Some(
            SqliteReportStore::connect(path)
                .await
                .context("Failed to open history database")?,
        ),
        None => None,
    };

    let tables = if args.tables.is_empty() {
        source.list_tables().await?
    } else {
        args.tables.clone()
    };

    let mut reports = Vec::with_capacity(tables.len());
    for table in &tables {
        let rules = registry.snapshot_for(table);
        if rules.is_empty() {
            warn!("No enabled rules target table '{}'", table);
        }

        let snapshot = source
            .load_snapshot(table, &rules)
            .await
            .with_context(|| format!("Failed to load table '{}'", table))?;

        let history = match &store {
            Some(store) => Some(store.score_series(table, args.history_runs).await?),
            None => None,
        };

        let report = assessor.assess(&snapshot, &rules, history.as_deref())?;

        if let Some(store) = &store {
            let run_id = store.append(&report).await?;
            info!("Stored run {} for '{}'", run_id, table);
        }
        reports.push(report);
    }

    source.close().await;
    if let Some(store) = &store {
        store.close().await;
    }

    match args.format {
        OutputFormat::Json => print_json(&reports)?,
        OutputFormat::Text => {
            for report in &reports {
                print!("{}", output::render_report(report));
            }
        }
    }
    Ok(())
}

/// Profiles one table without evaluating rules.
async fn profile(args: &ProfileArgs) -> anyhow::Result<()> {
    info!("Target: {}", redact_database_url(&args.database));
    let source = SqliteSource::connect(&args.database)
        .await
        .context("Failed to open dataset database")?;
    let table = source
        .load_table(&args.table)
        .await
        .with_context(|| format!("Failed to load table '{}'", args.table))?;
    source.close().await;

    let profiles = QualityAssessor::with_defaults().profile_table(&table);
    match args.format {
        OutputFormat::Json => print_json(&profiles)?,
        OutputFormat::Text => print!("{}", output::render_profiles(&table.name, &profiles)),
    }
    Ok(())
}

/// Prints per-table counts, daily trends and recent failed checks.
async fn summary(args: &SummaryArgs) -> anyhow::Result<()> {
    let store = SqliteReportStore::connect(&args.history_db)
        .await
        .context("Failed to open history database")?;

    let since = Utc::now() - Duration::days(i64::from(args.days));
    let reports = store.since(since).await?;
    store.close().await;

    let summary = summarize(&reports, since, args.failed);
    match args.format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => print!("{}", output::render_summary(&summary)),
    }
    Ok(())
}

fn rules(args: &RulesArgs) -> anyhow::Result<()> {
    let registry = args.rule_source.load()?;
    let rules: Vec<_> = registry.rules().collect();
    match args.format {
        OutputFormat::Json => print_json(&rules)?,
        OutputFormat::Text => print!("{}", output::render_rules(&rules)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_run() {
        let cli = parse(&[
            "dqmonitor",
            "-vv",
            "run",
            "--database",
            "shop.db",
            "--table",
            "orders",
            "--table",
            "customers",
            "--default-rules",
            "--history-db",
            "history.db",
            "--history",
            "10",
            "--format",
            "json",
        ]);
        assert_eq!(cli.global.verbose, 2);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.database, "shop.db");
        assert_eq!(args.tables, vec!["orders", "customers"]);
        assert!(args.rule_source.default_rules);
        assert_eq!(args.history_db.as_deref(), Some("history.db"));
        assert_eq!(args.history_runs, 10);
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_run_defaults() {
        let cli = parse(&["dqmonitor", "run", "--database", "shop.db", "--rules", "r.json"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.tables.is_empty());
        assert_eq!(args.history_runs, 30);
        assert_eq!(args.format, OutputFormat::Text);
        assert_eq!(args.rule_source.rules, Some(PathBuf::from("r.json")));
    }

    #[test]
    fn test_rules_and_default_rules_conflict() {
        let result = Cli::try_parse_from([
            "dqmonitor",
            "rules",
            "--rules",
            "r.json",
            "--default-rules",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rule_source_requires_a_choice() {
        let source = RuleSource {
            rules: None,
            default_rules: false,
        };
        assert!(source.load().is_err());

        let source = RuleSource {
            rules: None,
            default_rules: true,
        };
        assert_eq!(source.load().unwrap().len(), 13);
    }

    #[test]
    fn test_parse_summary_and_quiet() {
        let cli = parse(&[
            "dqmonitor",
            "summary",
            "--history-db",
            "h.db",
            "--days",
            "30",
            "-q",
        ]);
        assert!(cli.global.quiet);
        let Command::Summary(args) = cli.command else {
            panic!("expected summary command");
        };
        assert_eq!(args.days, 30);
        assert_eq!(args.failed, 10);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_violation_samples": 2}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.max_violation_samples, 2);
        assert!(load_config(Some(&dir.path().join("absent.json"))).is_err());
        assert_eq!(load_config(None).unwrap().max_violation_samples, 5);
    }
}
