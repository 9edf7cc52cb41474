//! # Connection Lifecycle
//!
//! Finite-state machine for the single gateway session plus a reconnect
//! scheduler with exponential backoff and a bounded event history.
//!
//! ## State Machine
//!
//! ```text
//! Disconnected ──connect──→ Connecting ──qr──→ QrReady
//!       ↑                        │                │
//!       │                        └────open────────┴──→ Connected
//!       │                                                 │
//!       └──── auth invalid ──── close ←───────────────────┘
//!                                 │ retryable
//!                                 ↓
//!                           Reconnecting ──exhausted──→ Error
//! ```
//!
//! Entering `Connected` resets the attempt counter and cancels any pending
//! timer. Entering `Disconnected` from anything but `Reconnecting` cancels any
//! pending timer, so a manual disconnect is never undone by a stale retry.

mod close_reason;
mod config;
mod history;
mod manager;
mod types;

pub use close_reason::{
    classify_close_reason, CloseClassification, CLOSE_FORBIDDEN, CLOSE_LOGGED_OUT,
    CLOSE_VERSION_REJECTED,
};
pub use config::ReconnectPolicy;
pub use history::HISTORY_CAPACITY;
pub use manager::{ConnectFn, ConnectionManager};
pub use types::{ConnectionEvent, ConnectionState, ConnectionStats, StateData};
