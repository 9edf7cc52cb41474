//! Subscriber installation and structured logging helpers.
//!
//! Records carry consistent fields so log shippers can parse them:
//! - `timestamp`, `level`, `target`
//! - `subsystem`: always `notify` for records emitted through the macros
//! - `message` plus any structured context fields

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Subsystem tag stamped by the logging macros.
pub const SUBSYSTEM: &str = "notify";

/// Build the filter from `config`, rejecting malformed directives.
pub fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(&config.log_level).map_err(|e| {
        TelemetryError::Config(format!("invalid log filter {:?}: {e}", config.log_level))
    })
}

/// Install the global subscriber.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json_logs {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(config.show_target))
            .try_init()
    };
    installed.map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        filter = %config.log_level,
        "Structured logging configured"
    );
    Ok(())
}

/// Log with `subsystem = "notify"` attached.
///
/// ```rust,ignore
/// log_event!(info, "Gateway connected", phone_number = %number);
/// ```
#[macro_export]
macro_rules! log_event {
    (info, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(
            subsystem = $crate::SUBSYSTEM,
            $($($field)*,)?
            $msg
        )
    };

    (warn, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(
            subsystem = $crate::SUBSYSTEM,
            $($($field)*,)?
            $msg
        )
    };

    (error, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(
            subsystem = $crate::SUBSYSTEM,
            $($($field)*,)?
            $msg
        )
    };

    (debug, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(
            subsystem = $crate::SUBSYSTEM,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a connection state change with standard fields.
#[macro_export]
macro_rules! log_state_event {
    ($level:ident, $msg:expr, $state:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $crate::SUBSYSTEM,
            state = %$state,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a message delivery event with standard fields.
#[macro_export]
macro_rules! log_message_event {
    ($level:ident, $msg:expr, $recipient:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $crate::SUBSYSTEM,
            recipient = %$recipient,
            $($($field)*,)?
            $msg
        )
    };
}
