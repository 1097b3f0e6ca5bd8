//! Shared logging setup for DQMonitor binaries.
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! the caller's job and happens once per process through this module.

use tracing_subscriber::EnvFilter;

use crate::Result;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Maps verbosity flags to a maximum log level.
///
/// `quiet` wins over any verbosity: 0=INFO, 1=DEBUG, 2+=TRACE.
pub fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging based on verbosity level.
///
/// # Example
/// ```rust,no_run
/// use dqmonitor_core::logging::init_logging;
///
/// init_logging(1, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    init_logging_with_format(verbose, quiet, LogFormat::Pretty)
}

/// Initializes logging with an explicit output format.
///
/// When `RUST_LOG` is set it takes precedence over the verbosity flags.
/// Events go to stderr so reports printed on stdout stay machine-readable.
pub fn init_logging_with_format(verbose: u8, quiet: bool, format: LogFormat) -> Result<()> {
    let level = level_for(verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| {
        crate::error::DqError::configuration(format!("Failed to initialize logging: {}", e))
    })
}
