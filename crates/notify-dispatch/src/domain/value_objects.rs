//! Value objects shared across the domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Milliseconds since the Unix epoch.
///
/// Produced by a `TimeSource` so that rate limiting and connection history can
/// be driven deterministically in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from epoch milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Epoch milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Timestamp shifted forward by `duration`.
    pub fn add(&self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration_millis(duration)))
    }

    /// Calendar time for persisted records.
    pub fn to_utc(&self) -> DateTime<Utc> {
        i64::try_from(self.0)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_default()
    }

    /// Elapsed time since `earlier`; zero if `earlier` is in the future.
    pub fn since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Duration in whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Canonical recipient identifier: country code followed by the national
/// number, digits only.
///
/// Only the phone validator constructs these, so every rate-limit key and log
/// identity is guaranteed to be in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientAddress(String);

impl RecipientAddress {
    pub(crate) fn from_canonical(digits: String) -> Self {
        Self(digits)
    }

    /// The canonical digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecipientAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
