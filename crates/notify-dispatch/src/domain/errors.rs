//! # Domain Errors
//!
//! Error types surfaced by the notification subsystem.
//!
//! `DispatchError` is what callers of `send_message` see. None of its variants
//! are fatal to the process; each carries a stable machine-readable code and a
//! human-readable reason.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable error codes returned to callers of the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Session is not in the `Connected` state.
    NotConnected,
    /// Recipient failed phone number validation.
    InvalidRecipient,
    /// Recipient key is throttled.
    RateLimited,
    /// Recipient is not registered on the messaging network.
    RecipientUnreachable,
    /// The transport failed the probe or the send.
    TransportError,
}

impl ErrorCode {
    /// Wire representation of the code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotConnected => "NOT_CONNECTED",
            Self::InvalidRecipient => "INVALID_RECIPIENT",
            Self::RateLimited => "RATE_LIMITED",
            Self::RecipientUnreachable => "RECIPIENT_UNREACHABLE",
            Self::TransportError => "TRANSPORT_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single send request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Gateway session is not connected.
    #[error("Messaging gateway is not connected")]
    NotConnected,

    /// Recipient could not be normalized.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    /// Recipient is throttled; retry after the given number of seconds.
    #[error("Rate limit exceeded for recipient, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the recipient is accepted again.
        retry_after_secs: u64,
    },

    /// Recipient is not resolvable on the provider.
    #[error("Recipient {0} is not registered on the messaging network")]
    RecipientUnreachable(String),

    /// Provider or network failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl DispatchError {
    /// Stable code for this error.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotConnected => ErrorCode::NotConnected,
            Self::InvalidRecipient(_) => ErrorCode::InvalidRecipient,
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::RecipientUnreachable(_) => ErrorCode::RecipientUnreachable,
            Self::Transport(_) => ErrorCode::TransportError,
        }
    }

    /// Retry hint in seconds, when the error carries one.
    pub const fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

/// Errors reported by a `Transport` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No live session to operate on.
    #[error("No active transport session")]
    NoSession,

    /// Network-level failure (socket, timeout, DNS).
    #[error("Network failure: {0}")]
    Network(String),

    /// Provider refused the request.
    #[error("Provider rejected request: {0}")]
    Rejected(String),

    /// Connection closed with a provider status code.
    #[error("Connection closed (code {code:?}): {message}")]
    Closed {
        /// Provider close code, if any.
        code: Option<u16>,
        /// Provider close message.
        message: String,
    },
}

/// Errors reported by persistence ports (message log, settings, credentials).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failed.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be encoded or decoded.
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store is unavailable for another reason.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(DispatchError::NotConnected.code().as_str(), "NOT_CONNECTED");
        assert_eq!(
            DispatchError::InvalidRecipient("x".into()).code().as_str(),
            "INVALID_RECIPIENT"
        );
        assert_eq!(
            DispatchError::RateLimited { retry_after_secs: 3 }.code().as_str(),
            "RATE_LIMITED"
        );
        assert_eq!(
            DispatchError::RecipientUnreachable("62812".into()).code().as_str(),
            "RECIPIENT_UNREACHABLE"
        );
        assert_eq!(
            DispatchError::Transport("boom".into()).code().as_str(),
            "TRANSPORT_ERROR"
        );
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let err = DispatchError::RateLimited { retry_after_secs: 120 };
        assert_eq!(err.retry_after_secs(), Some(120));
        assert!(err.to_string().contains("120s"));
        assert_eq!(DispatchError::NotConnected.retry_after_secs(), None);
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCode::RecipientUnreachable).unwrap();
        assert_eq!(json, "\"RECIPIENT_UNREACHABLE\"");
    }

    #[test]
    fn test_transport_closed_display() {
        let err = TransportError::Closed {
            code: Some(401),
            message: "logged out".into(),
        };
        assert!(err.to_string().contains("401"));
    }
}
