//! # Notify Telemetry
//!
//! Logging setup shared by the notification binaries and tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notify_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(&TelemetryConfig::from_env())?;
//!     // Application code here
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NOTIFY_LOG_LEVEL` | `info` | Filter directive (falls back to `RUST_LOG`) |
//! | `NOTIFY_JSON_LOGS` | `false` | JSON lines output |
//! | `NOTIFY_LOG_TARGETS` | `false` | Show targets in text output |
//! | `NOTIFY_SERVICE_NAME` | `lab-notify` | Service name |

#![warn(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging, SUBSYSTEM};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// A global subscriber is already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),

    /// Configuration is unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging for the process.
///
/// Call once, early in `main`; a second call returns
/// [`TelemetryError::AlreadyInitialized`].
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    init_logging(config)
}
