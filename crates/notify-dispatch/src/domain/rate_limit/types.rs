//! Rate limiter types.

use crate::domain::Timestamp;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Per-key request history.
#[derive(Debug, Clone, Default)]
pub struct RateLimitWindow {
    /// Accepted request times, oldest first.
    pub timestamps: VecDeque<Timestamp>,
    /// Key is blocked while `now < blocked_until`.
    pub blocked_until: Option<Timestamp>,
}

impl RateLimitWindow {
    /// True while the cooldown block is active.
    pub fn is_blocked(&self, now: Timestamp) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    /// Drop timestamps that fell out of the trailing window.
    pub fn prune(&mut self, now: Timestamp, window: Duration) {
        while self
            .timestamps
            .front()
            .is_some_and(|ts| now.since(*ts) >= window)
        {
            self.timestamps.pop_front();
        }
    }

    /// Lift an elapsed block. The key starts over with an empty window.
    pub fn expire_block(&mut self, now: Timestamp) -> bool {
        match self.blocked_until {
            Some(until) if now >= until => {
                self.blocked_until = None;
                self.timestamps.clear();
                true
            }
            _ => false,
        }
    }

    /// Requests still inside the window, without mutating.
    pub fn in_window(&self, now: Timestamp, window: Duration) -> usize {
        self.timestamps
            .iter()
            .filter(|ts| now.since(**ts) < window)
            .count()
    }

    /// True when nothing is tracked any more.
    pub fn is_idle(&self) -> bool {
        self.timestamps.is_empty() && self.blocked_until.is_none()
    }
}

/// Result of an advisory `check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    /// Whether a request would be accepted now.
    pub allowed: bool,
    /// Requests left in the window after this one.
    pub remaining: u32,
    /// When the window (or block) next frees capacity.
    pub reset_at: Timestamp,
    /// Whole seconds until the block lifts, when rejected.
    pub retry_after_secs: Option<u64>,
}

/// Aggregate limiter counters for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimiterStats {
    /// Keys with any tracked state.
    pub tracked_keys: usize,
    /// Keys currently blocked.
    pub blocked_keys: usize,
    /// Requests inside their window, summed over all keys.
    pub total_requests: usize,
}
