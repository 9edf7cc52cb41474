//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound port traits: a loopback transport, message log,
//! settings and credential stores, and clocks.

mod credentials;
mod loopback;
mod message_log;
mod settings;
mod time;

pub use credentials::{FileCredentialStore, InMemoryCredentialStore};
pub use loopback::{LoopbackConfig, LoopbackTransport, SentMessage};
pub use message_log::{InMemoryMessageLogStore, JsonlMessageLogStore};
pub use settings::{CachedSettingsStore, FileSettingsStore, InMemorySettingsStore};
pub use time::{ManualTimeSource, SystemTimeSource};
