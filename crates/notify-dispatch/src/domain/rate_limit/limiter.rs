//! Sliding-window rate limiter implementation.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::config::RateLimitConfig;
use super::types::{RateLimitDecision, RateLimitWindow, RateLimiterStats};
use crate::domain::value_objects::duration_millis;
use crate::domain::Timestamp;
use crate::ports::TimeSource;

/// Per-key sliding-window limiter with cooldown blocks.
///
/// All state sits behind one short-held mutex; the sweep takes the same lock
/// for a single pass and never awaits while holding it.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, RateLimitWindow>>,
    time_source: Arc<dyn TimeSource>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a limiter. The background sweep is started separately with
    /// [`RateLimiter::spawn_sweeper`].
    pub fn new(config: RateLimitConfig, time_source: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            time_source,
            sweeper: Mutex::new(None),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Would a request for `key` be accepted now? Does not record it.
    ///
    /// A key whose pruned history already holds `max_requests` entries is
    /// blocked for `block_duration` starting now.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.time_source.now();
        let mut windows = self.windows.lock();

        if let Some(window) = windows.get_mut(key) {
            if let Some(until) = window.blocked_until {
                if now < until {
                    return Self::rejected(now, until);
                }
            }
            if window.expire_block(now) {
                debug!(key, "Rate limit block expired");
            }
            window.prune(now, self.config.window);
        }

        let count = windows.get(key).map_or(0, |w| w.timestamps.len());
        let max = self.config.max_requests as usize;
        if count >= max {
            let until = now.add(self.config.block_duration);
            windows.entry(key.to_owned()).or_default().blocked_until = Some(until);
            warn!(
                key,
                requests = count,
                block_secs = self.config.block_duration.as_secs(),
                "Rate limit exceeded, key blocked"
            );
            return Self::rejected(now, until);
        }

        let reset_at = windows
            .get(key)
            .and_then(|w| w.timestamps.front().copied())
            .unwrap_or(now)
            .add(self.config.window);
        if windows.get(key).is_some_and(RateLimitWindow::is_idle) {
            windows.remove(key);
        }

        RateLimitDecision {
            allowed: true,
            remaining: u32::try_from(max - count - 1).unwrap_or(u32::MAX),
            reset_at,
            retry_after_secs: None,
        }
    }

    /// Record one accepted request for `key`.
    ///
    /// Call once per attempt after `check` allowed it; recording twice
    /// tightens the effective limit.
    pub fn record(&self, key: &str) {
        let now = self.time_source.now();
        let mut windows = self.windows.lock();
        let window = windows.entry(key.to_owned()).or_default();
        window.timestamps.push_back(now);
        window.prune(now, self.config.window);
    }

    /// Forget everything tracked for `key`. Returns true if anything was
    /// tracked.
    pub fn reset(&self, key: &str) -> bool {
        let removed = self.windows.lock().remove(key).is_some();
        if removed {
            debug!(key, "Rate limit state reset");
        }
        removed
    }

    /// Forget every key.
    pub fn reset_all(&self) {
        let mut windows = self.windows.lock();
        let keys = windows.len();
        windows.clear();
        debug!(keys, "Rate limit state reset for all keys");
    }

    /// Aggregate counters; does not prune.
    pub fn stats(&self) -> RateLimiterStats {
        let now = self.time_source.now();
        let windows = self.windows.lock();
        RateLimiterStats {
            tracked_keys: windows.len(),
            blocked_keys: windows.values().filter(|w| w.is_blocked(now)).count(),
            total_requests: windows
                .values()
                .map(|w| w.in_window(now, self.config.window))
                .sum(),
        }
    }

    /// One sweep pass: prune stale timestamps, lift expired blocks and drop
    /// keys with nothing left. Returns the number of keys removed.
    pub fn sweep(&self) -> usize {
        let now = self.time_source.now();
        let window_len = self.config.window;
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, window| {
            window.expire_block(now);
            window.prune(now, window_len);
            !window.is_idle()
        });
        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "Rate limit sweep");
        }
        removed
    }

    /// Start the periodic sweep on the current runtime, replacing any running
    /// sweeper. Returns false when called outside a runtime.
    ///
    /// The task holds only a weak reference, so dropping the limiter ends it.
    pub fn spawn_sweeper(self: &Arc<Self>) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, rate limit sweep not started");
            return false;
        };
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval.max(Duration::from_millis(1));

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(limiter) = weak.upgrade() else {
                    break;
                };
                limiter.sweep();
            }
        });

        if let Some(previous) = self.sweeper.lock().replace(handle) {
            previous.abort();
        }
        true
    }

    /// True while the background sweep is running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the sweep and drop all tracked state.
    pub fn destroy(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        self.windows.lock().clear();
        debug!("Rate limiter destroyed");
    }

    fn rejected(now: Timestamp, until: Timestamp) -> RateLimitDecision {
        let millis = duration_millis(until.since(now));
        RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at: until,
            retry_after_secs: Some(millis.div_ceil(1000)),
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_keys", &self.windows.lock().len())
            .finish_non_exhaustive()
    }
}
