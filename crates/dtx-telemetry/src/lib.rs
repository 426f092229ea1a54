//! # DTX Telemetry
//!
//! Logging setup shared by the distributed transaction coordinator crates.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dtx_telemetry::{init_tracing, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_tracing(&config).expect("Failed to init tracing");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `dtx-coordinator` | Service name in logs |
//! | `DTX_LOG_LEVEL` | `info` | Log level filter |
//! | `DTX_JSON_LOGS` | `false` | JSON formatted output |
//! | `DTX_CONSOLE_OUTPUT` | `true` | Write logs to stdout |

#![warn(missing_docs)]

mod config;
mod logging;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{build_env_filter, init_tracing};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("Tracing subscriber already initialized: {0}")]
    AlreadyInitialized(String),

    /// Invalid configuration (e.g. malformed filter directive).
    #[error("Invalid configuration: {0}")]
    Config(String),
}
