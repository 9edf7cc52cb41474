//! # State Event Channel
//!
//! Publish/subscribe for connection state changes.
//!
//! Listeners hold a [`Subscription`] handle. Dropping the handle (or calling
//! [`Subscription::unsubscribe`]) removes the listener; closing the channel
//! ends every outstanding subscription, which then yields `None`.

mod channel;
mod subscription;

pub use channel::EventChannel;
pub use subscription::{Subscription, SubscriptionError};

/// Maximum events buffered per subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
