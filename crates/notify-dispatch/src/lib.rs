//! # Notify Dispatch
//!
//! Outbound notification delivery over a paired messaging gateway.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Send transactional messages (order ready, payment reminders) to customer
//! phone numbers over a single long-lived gateway session:
//! - Connection lifecycle state machine with exponential-backoff reconnects
//! - Per-recipient sliding-window rate limiting with cooldown blocks
//! - Phone number normalization to one canonical address per subscriber
//! - An append-only log of every delivery attempt
//!
//! ## Send Pipeline
//!
//! | Step | Failure |
//! |------|---------|
//! | Session is `Connected` | `NOT_CONNECTED` |
//! | Recipient normalizes | `INVALID_RECIPIENT` |
//! | Recipient under quota | `RATE_LIMITED` |
//! | Recipient registered | `RECIPIENT_UNREACHABLE` |
//! | Provider accepts | `TRANSPORT_ERROR` |
//!
//! ## Module Structure
//!
//! ```text
//! notify-dispatch/
//! ├── domain/      # Connection, rate limit, phone, message, settings
//! ├── events/      # State change pub/sub
//! ├── ports/       # NotificationApi, Transport, stores, TimeSource
//! ├── service/     # MessageDispatcher, Notifier
//! └── adapters/    # Loopback transport, file and in-memory stores
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod events;
pub mod ports;
pub mod service;

// Re-exports
pub use domain::{
    ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStats, DispatchError,
    ErrorCode, MessageLogEntry, MessageOutcome, MessageReceipt, MessageStatus, NotificationKind,
    NotificationSettings, PhoneValidation, PhoneValidator, RateLimitConfig, RateLimiter,
    RecipientAddress, ReconnectPolicy, SendRequest, StateData, StoreError, Timestamp,
    TransportError,
};
pub use events::Subscription;
pub use ports::{
    CredentialStore, Credentials, MessageLogStore, NotificationApi, SettingsStore, TimeSource,
    Transport, TransportEvent,
};
pub use service::{
    DispatcherConfig, DispatcherDeps, DispatcherStatus, MessageDispatcher, Notifier, NotifyError,
    NotifyOutcome, SkipReason,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
