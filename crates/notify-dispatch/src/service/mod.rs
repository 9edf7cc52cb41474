//! # Notification Service
//!
//! `MessageDispatcher` implements the `NotificationApi` driving port: it runs
//! the send pipeline and owns the gateway session lifecycle. `Notifier` sits
//! one layer up and decides, from stored settings, whether a business event
//! produces a message at all.

// Semantic submodules
mod core;
mod lifecycle;
mod notifier;
mod send;

// Re-export public API
pub use self::core::{DispatcherConfig, DispatcherDeps, DispatcherStatus, MessageDispatcher};
pub use notifier::{Notifier, NotifyError, NotifyOutcome, SkipReason};

#[cfg(test)]
mod tests;
