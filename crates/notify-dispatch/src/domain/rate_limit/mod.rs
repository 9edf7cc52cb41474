//! # Recipient Rate Limiting
//!
//! Sliding window by pruning: each key keeps the timestamps of its accepted
//! requests within the trailing window. Exceeding the quota puts the key into a
//! cooldown block that outlasts the window itself.
//!
//! `check` is advisory and never records; callers `record` exactly once per
//! accepted attempt. A background sweep drops idle keys and expired blocks.

mod config;
mod limiter;
mod types;

pub use config::RateLimitConfig;
pub use limiter::RateLimiter;
pub use types::{RateLimitDecision, RateLimitWindow, RateLimiterStats};
