//! # Giving dApp Telemetry
//!
//! Logging bootstrap shared by embedders of the donation workflow and by the
//! scenario test suite.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gd_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_logging(&config).expect("Failed to init logging");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `giving-dapp` | Service name in logs |
//! | `GD_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `GD_CONSOLE_OUTPUT` | `true` | Write logs to the console |
//! | `GD_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::{TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use logging::{init_logging, init_test_logging, LoggingStatus};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The log filter could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
