//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name stamped on every record.
    pub service_name: String,

    /// Filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` expression).
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json_logs: bool,

    /// Include span targets in human-readable output.
    pub show_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "lab-notify".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            show_target: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NOTIFY_SERVICE_NAME`: Service name (default: lab-notify)
    /// - `NOTIFY_LOG_LEVEL` or `RUST_LOG`: Filter (default: info)
    /// - `NOTIFY_JSON_LOGS`: JSON output (default: false, true in containers)
    /// - `NOTIFY_LOG_TARGETS`: Show targets (default: false)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("NOTIFY_SERVICE_NAME")
                .unwrap_or_else(|_| "lab-notify".to_string()),

            log_level: env::var("NOTIFY_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("NOTIFY_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            show_target: env::var("NOTIFY_LOG_TARGETS")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    /// Override the filter, e.g. from a CLI flag.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
