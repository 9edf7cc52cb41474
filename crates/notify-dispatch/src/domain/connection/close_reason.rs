//! Close reason classification.
//!
//! The gateway reports why a session closed with a numeric status code. Most
//! closes are transient and are retried by the reconnect scheduler; a few mean
//! the stored credentials are no longer usable and a new pairing is required.

use serde::{Deserialize, Serialize};

/// Provider code for a session that was logged out from the paired device.
pub const CLOSE_LOGGED_OUT: u16 = 401;
/// Provider code for a session that was refused access.
pub const CLOSE_FORBIDDEN: u16 = 403;
/// Provider code for a client version the gateway no longer accepts.
pub const CLOSE_VERSION_REJECTED: u16 = 405;

/// What a session close means for the reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseClassification {
    /// Transient; schedule a reconnect.
    Retryable,
    /// Credentials were revoked; purge them and wait for a new pairing.
    AuthInvalid,
    /// Client version refused; purge credentials and stop.
    VersionRejected,
}

impl CloseClassification {
    /// True when the close should be handed to the reconnect scheduler;
    /// otherwise stored credentials are discarded.
    pub const fn should_reconnect(&self) -> bool {
        matches!(self, Self::Retryable)
    }
}

/// Classify a close code reported by the transport.
///
/// A missing code (socket dropped without a status) is treated as transient.
pub fn classify_close_reason(code: Option<u16>) -> CloseClassification {
    match code {
        Some(CLOSE_LOGGED_OUT) | Some(CLOSE_FORBIDDEN) => CloseClassification::AuthInvalid,
        Some(CLOSE_VERSION_REJECTED) => CloseClassification::VersionRejected,
        _ => CloseClassification::Retryable,
    }
}
