//! Rate limiter configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Accepted requests per key within one window
    pub max_requests: u32,
    /// Length of the trailing window
    pub window: Duration,
    /// Cooldown imposed once the quota is exceeded
    pub block_duration: Duration,
    /// Interval of the background sweep
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 20,
            window: Duration::from_secs(60),
            block_duration: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// Testing config with smaller limits
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            max_requests: 3,
            window: Duration::from_secs(10),
            block_duration: Duration::from_secs(20),
            sweep_interval: Duration::from_secs(5),
        }
    }
}
