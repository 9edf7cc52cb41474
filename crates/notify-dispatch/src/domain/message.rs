//! # Message Records
//!
//! Send requests, their outcomes, and the append-only log entries written for
//! every attempt that reached the transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::{DispatchError, ErrorCode};
use super::value_objects::{RecipientAddress, Timestamp};

/// Business event a notification is about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A new lab order was registered.
    OrderCreated,
    /// Work on an order is finished and ready for pickup.
    OrderReady,
    /// An order was handed over to the clinic.
    OrderDelivered,
    /// A payment is due.
    PaymentReminder,
    /// A payment was received.
    PaymentReceived,
    /// Free-form message (manual sends, connection tests).
    #[default]
    Custom,
}

impl NotificationKind {
    /// Every kind, in declaration order.
    pub const ALL: [NotificationKind; 6] = [
        Self::OrderCreated,
        Self::OrderReady,
        Self::OrderDelivered,
        Self::PaymentReminder,
        Self::PaymentReceived,
        Self::Custom,
    ];

    /// Stable name used in logs and settings files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "order_created",
            Self::OrderReady => "order_ready",
            Self::OrderDelivered => "order_delivered",
            Self::PaymentReminder => "payment_reminder",
            Self::PaymentReceived => "payment_received",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a logged attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Accepted but not yet handed to the transport.
    Pending,
    /// Transport accepted the message.
    Sent,
    /// Probe or send failed.
    Failed,
}

/// One attempt in the append-only message log.
///
/// Retries produce new entries; entries are never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLogEntry {
    /// Entry id.
    pub id: Uuid,
    /// Canonical recipient.
    pub recipient: RecipientAddress,
    /// Business event the message was for.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Message text as sent.
    pub content: String,
    /// Attempt status.
    pub status: MessageStatus,
    /// Failure reason for `Failed` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Provider id for `Sent` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    /// When the attempt was made.
    pub created_at: DateTime<Utc>,
    /// When the provider accepted the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl MessageLogEntry {
    /// Entry for a message the transport accepted.
    pub fn sent(
        recipient: RecipientAddress,
        kind: NotificationKind,
        content: impl Into<String>,
        provider_message_id: impl Into<String>,
        at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            kind,
            content: content.into(),
            status: MessageStatus::Sent,
            error_message: None,
            provider_message_id: Some(provider_message_id.into()),
            created_at: at.to_utc(),
            sent_at: Some(at.to_utc()),
        }
    }

    /// Entry for a failed probe or send.
    pub fn failed(
        recipient: RecipientAddress,
        kind: NotificationKind,
        content: impl Into<String>,
        error: impl Into<String>,
        at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            kind,
            content: content.into(),
            status: MessageStatus::Failed,
            error_message: Some(error.into()),
            provider_message_id: None,
            created_at: at.to_utc(),
            sent_at: None,
        }
    }
}

/// A request to send one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    /// Recipient as entered by the user.
    pub recipient: String,
    /// Message text.
    pub content: String,
    /// Business event the message is for.
    #[serde(default)]
    pub kind: NotificationKind,
}

impl SendRequest {
    /// Free-form message to `recipient`.
    pub fn new(recipient: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            content: content.into(),
            kind: NotificationKind::Custom,
        }
    }

    /// Tag the request with a notification kind.
    #[must_use]
    pub fn with_kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Proof that the transport accepted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    /// Provider message id.
    pub message_id: String,
    /// Canonical recipient the message went to.
    pub recipient: RecipientAddress,
    /// When it was accepted.
    pub sent_at: Timestamp,
}

/// Flat, serializable result of a send for UI consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageOutcome {
    /// Whether the transport accepted the message.
    pub success: bool,
    /// Provider message id on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Human-readable reason on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable failure code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Seconds to wait before retrying a throttled recipient.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl From<Result<MessageReceipt, DispatchError>> for MessageOutcome {
    fn from(result: Result<MessageReceipt, DispatchError>) -> Self {
        match result {
            Ok(receipt) => Self {
                success: true,
                message_id: Some(receipt.message_id),
                error: None,
                error_code: None,
                retry_after_secs: None,
            },
            Err(error) => Self {
                success: false,
                message_id: None,
                error: Some(error.to_string()),
                error_code: Some(error.code()),
                retry_after_secs: error.retry_after_secs(),
            },
        }
    }
}
