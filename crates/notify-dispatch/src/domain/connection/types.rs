//! Connection lifecycle types.

use crate::domain::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Gateway session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session and no pending retry.
    #[default]
    Disconnected,
    /// Transport is establishing a session.
    Connecting,
    /// Waiting for the user to scan a QR code or enter a pairing code.
    QrReady,
    /// Session is live; messages can be sent.
    Connected,
    /// A reconnect attempt is scheduled.
    Reconnecting,
    /// Terminal failure; needs an explicit reconnect.
    Error,
}

impl ConnectionState {
    /// Wire name of the state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::QrReady => "qr_ready",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional payload attached to a state transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateData {
    /// Error description (for `Error` or a failed close).
    pub error: Option<String>,
    /// Raw QR payload to render for pairing.
    pub qr: Option<String>,
    /// Numeric pairing code alternative to the QR.
    pub pairing_code: Option<String>,
    /// Phone number of the paired account.
    pub phone_number: Option<String>,
}

impl StateData {
    /// Payload with only an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Payload with only a QR code.
    pub fn qr(qr: impl Into<String>) -> Self {
        Self {
            qr: Some(qr.into()),
            ..Self::default()
        }
    }

    /// Payload with only a phone number.
    pub fn phone_number(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: Some(phone_number.into()),
            ..Self::default()
        }
    }
}

/// Immutable record of one state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    /// State entered.
    pub state: ConnectionState,
    /// When the transition happened.
    pub timestamp: Timestamp,
    /// Error description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// QR payload, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    /// Pairing code, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    /// Paired phone number, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl ConnectionEvent {
    pub(crate) fn new(state: ConnectionState, timestamp: Timestamp, data: StateData) -> Self {
        Self {
            state,
            timestamp,
            error: data.error,
            qr: data.qr,
            pairing_code: data.pairing_code,
            phone_number: data.phone_number,
        }
    }
}

/// Snapshot of connection metrics for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    /// Current state.
    pub current_state: ConnectionState,
    /// Reconnect attempts made since the last reset.
    pub reconnect_attempts: u32,
    /// Events recorded in the bounded history.
    pub total_events: usize,
    /// Time since the most recent `Connected` event, while still connected.
    pub uptime: Option<Duration>,
    /// Timestamp of the most recent `Connected` event.
    pub last_connected: Option<Timestamp>,
    /// Timestamp of the most recent `Disconnected` event.
    pub last_disconnected: Option<Timestamp>,
    /// Error of the most recent event carrying one.
    pub last_error: Option<String>,
}
