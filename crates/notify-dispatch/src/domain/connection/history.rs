//! Bounded connection event history.

use super::types::{ConnectionEvent, ConnectionState};
use std::collections::VecDeque;

/// Default number of retained events.
pub const HISTORY_CAPACITY: usize = 50;

/// Ring buffer of connection events; the oldest event is evicted first.
#[derive(Debug, Clone)]
pub(crate) struct EventHistory {
    events: VecDeque<ConnectionEvent>,
    capacity: usize,
}

impl EventHistory {
    /// Create an empty history holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, evicting the oldest when full.
    pub fn push(&mut self, event: ConnectionEvent) {
        while self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Copy of the retained events, oldest first.
    pub fn to_vec(&self) -> Vec<ConnectionEvent> {
        self.events.iter().cloned().collect()
    }

    /// Most recent event in `state`.
    pub fn last_in_state(&self, state: ConnectionState) -> Option<&ConnectionEvent> {
        self.events.iter().rev().find(|e| e.state == state)
    }

    /// Most recent error message.
    pub fn last_error(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|e| e.error.as_deref())
    }
}
