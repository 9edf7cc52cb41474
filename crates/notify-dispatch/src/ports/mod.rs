//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Port (Inbound):** the API the host application calls
//! - **Driven Ports (Outbound):** the transport, persistence and clock this
//!   subsystem requires from adapters

pub mod inbound;
pub mod outbound;

pub use inbound::NotificationApi;
pub use outbound::{
    CredentialStore, Credentials, MessageLogStore, SessionHandle, SettingsStore, TimeSource,
    Transport, TransportEvent,
};
