//! Structured logging setup.
//!
//! JSON output carries these fields for log shippers:
//! - `timestamp`, `level`, `target`
//! - `fields.message` and the structured fields of the event
//! - `span` / `spans`, including the `donation` span with its `correlation_id`

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Outcome of [`init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingStatus {
    /// The subscriber was installed by this call.
    Installed,
    /// A global subscriber already existed; nothing changed.
    AlreadyInstalled,
}

fn env_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(level).map_err(|e| TelemetryError::Config(e.to_string()))
}

/// Install the global subscriber.
///
/// Safe to call more than once: later calls leave the first subscriber in place.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingStatus, TelemetryError> {
    let filter = env_filter(&config.log_level)?;

    // JSON output for containers/production
    let json_layer = (config.console_output && config.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    // Pretty output for development
    let fmt_layer = (config.console_output && !config.json_logs).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true)
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if !installed {
        return Ok(LoggingStatus::AlreadyInstalled);
    }

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Logging initialized"
    );
    Ok(LoggingStatus::Installed)
}

/// Install a subscriber that writes through the test harness capture.
///
/// Uses `GD_LOG_LEVEL` / `RUST_LOG`, defaulting to `debug`.
pub fn init_test_logging() -> LoggingStatus {
    let level = std::env::var("GD_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "debug".to_string());
    let filter = env_filter(&level).unwrap_or_else(|_| EnvFilter::new("debug"));

    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
    {
        Ok(()) => LoggingStatus::Installed,
        Err(_) => LoggingStatus::AlreadyInstalled,
    }
}
