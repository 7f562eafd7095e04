//! Logging for the valtimo plugin framework
//!
//! Library crates emit events through `tracing`. This crate installs the
//! subscriber once per process and provides the colored console helpers used
//! for user-facing output in the CLI.

use colored::Colorize;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable that overrides the verbosity-derived filter.
pub const LOG_ENV: &str = "VALTIMO_LOG";

static VERBOSITY: Mutex<u8> = Mutex::new(0);

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Logger already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Get the current verbosity level
pub fn get_verbosity() -> u8 {
    VERBOSITY.lock().ok().map(|v| *v).unwrap_or(0)
}

fn set_verbosity(verbosity: u8) {
    if let Ok(mut v) = VERBOSITY.lock() {
        *v = verbosity;
    }
}

/// Convert a verbosity level to a filter directive
/// 0 = warn only, 1 = debug for framework crates (-v), 2 = trace (-vv)
pub fn verbosity_to_filter(verbosity: u8) -> String {
    match verbosity {
        0 => "warn".to_string(),
        1 => "warn,valtimo_plugin=debug,valtimo_definitions=debug,valtimo_config=debug,valtimo_cli=debug"
            .to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global tracing subscriber.
///
/// `VALTIMO_LOG` takes precedence over the verbosity level when it is set.
pub fn init_with_verbosity(verbosity: u8, format: LogFormat) -> Result<(), LoggerError> {
    set_verbosity(verbosity);

    let directive = std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| verbosity_to_filter(verbosity));
    let filter = EnvFilter::try_new(&directive).map_err(|e| LoggerError::InvalidFilter {
        filter: directive.clone(),
        reason: e.to_string(),
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    result.map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))
}

/// Log an informational message (to console if verbose >= 1)
pub fn info(message: &str) {
    tracing::info!("{}", message);
    if get_verbosity() >= 1 {
        eprintln!("{}", message);
    }
}

/// Log a warning message
pub fn warn(message: &str) {
    tracing::warn!("{}", message);
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}

/// Log an error message
pub fn error(message: &str) {
    tracing::error!("{}", message);
    eprintln!("{} {}", "Error:".red().bold(), message);
}

/// Log a success message (console only, for user feedback)
pub fn success(message: &str) {
    let check = "\u{2714}".green().bold();
    eprintln!("{} {}", check, message);
}
