//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the host application implements: the messaging transport, the
//! durable message log, notification settings, stored pairing credentials and
//! the clock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{
    MessageLogEntry, MessageStatus, NotificationSettings, RecipientAddress, StoreError,
    Timestamp, TransportError,
};

/// Opaque handle to a live transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(Uuid);

impl SessionHandle {
    /// Allocate a fresh handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Handle identifier.
    pub fn id(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Pairing credentials persisted between runs. Opaque to this subsystem.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(String);

impl Credentials {
    /// Wrap a serialized credential blob.
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    /// The serialized blob.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// Connection updates emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Session negotiation started.
    Connecting,
    /// A QR payload is ready for the user to scan.
    QrCode(String),
    /// A numeric pairing code is ready for the user to enter.
    PairingCode(String),
    /// Session is open.
    Open {
        /// Phone number of the paired account.
        phone_number: Option<String>,
    },
    /// Session closed.
    Closed {
        /// Provider status code, if reported.
        code: Option<u16>,
        /// Provider close message.
        message: String,
    },
    /// Credentials changed and should be persisted.
    CredentialsUpdated(Credentials),
}

/// Messaging-network client.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; sends for different recipients run
/// concurrently.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session. May emit `QrCode` / `PairingCode` events before
    /// resolving. `None` credentials start a fresh pairing.
    async fn connect(&self, credentials: Option<Credentials>)
        -> Result<SessionHandle, TransportError>;

    /// Send a text message; returns the provider message id.
    async fn send(
        &self,
        session: &SessionHandle,
        recipient: &RecipientAddress,
        content: &str,
    ) -> Result<String, TransportError>;

    /// Whether the recipient is registered on the network.
    async fn exists(
        &self,
        session: &SessionHandle,
        recipient: &RecipientAddress,
    ) -> Result<bool, TransportError>;

    /// Close the session, keeping the pairing.
    async fn disconnect(&self, session: &SessionHandle) -> Result<(), TransportError>;

    /// Close the session and unpair the device.
    async fn logout(&self, session: &SessionHandle) -> Result<(), TransportError>;

    /// Stream of connection updates.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Append-only log of send attempts.
#[async_trait]
pub trait MessageLogStore: Send + Sync {
    /// Persist one attempt.
    async fn append(&self, entry: MessageLogEntry) -> Result<(), StoreError>;

    /// All attempts to a recipient, oldest first.
    async fn list_by_recipient(
        &self,
        recipient: &RecipientAddress,
    ) -> Result<Vec<MessageLogEntry>, StoreError>;

    /// All attempts with the given status, oldest first.
    async fn list_by_status(&self, status: MessageStatus)
        -> Result<Vec<MessageLogEntry>, StoreError>;

    /// A page of attempts, newest first.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MessageLogEntry>, StoreError>;
}

/// Per-installation notification preferences.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current settings; defaults when nothing was saved yet.
    async fn load(&self) -> Result<NotificationSettings, StoreError>;

    /// Replace the stored settings.
    async fn save(&self, settings: &NotificationSettings) -> Result<(), StoreError>;
}

/// Storage for the transport's pairing credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stored credentials, if any.
    async fn load(&self) -> Result<Option<Credentials>, StoreError>;

    /// Persist updated credentials.
    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError>;

    /// Remove stored credentials; idempotent.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Clock abstraction for deterministic tests.
pub trait TimeSource: Send + Sync {
    /// Current time.
    fn now(&self) -> Timestamp;
}
