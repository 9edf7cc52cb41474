//! Domain Layer - Pure notification logic with no I/O
//!
//! - Connection lifecycle state machine and reconnect scheduling
//! - Sliding-window rate limiting with cooldown blocks
//! - Recipient phone number normalization
//! - Message records, outcomes and the dispatch error taxonomy
//! - Template rendering for per-kind notification texts

pub mod connection;
pub mod errors;
pub mod message;
pub mod phone;
pub mod rate_limit;
pub mod settings;
pub mod value_objects;

pub use connection::*;
pub use errors::*;
pub use message::*;
pub use phone::*;
pub use rate_limit::*;
pub use settings::*;
pub use value_objects::*;
