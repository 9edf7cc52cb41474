//! Reconnect policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff policy for scheduled reconnects. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Attempts allowed before the manager gives up and enters `Error`.
    pub max_attempts: u32,
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the attempt that follows `attempts` prior attempts:
    /// `min(initial_delay * multiplier^attempts, max_delay)`.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let cap = self.max_delay.as_secs_f64();
        if !scaled.is_finite() || scaled >= cap {
            return self.max_delay;
        }
        Duration::from_millis((scaled * 1000.0).round() as u64)
    }

    /// Policy with millisecond-scale delays for tests.
    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
            backoff_multiplier: 2.0,
        }
    }
}
