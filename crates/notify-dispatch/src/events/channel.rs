//! Broadcast-backed event channel.

use super::subscription::Subscription;
use super::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Multi-consumer channel that can be closed explicitly.
///
/// Uses `tokio::sync::broadcast`, so publishing never blocks: a subscriber
/// that falls behind by more than the capacity skips the oldest events.
pub struct EventChannel<T: Clone + Send + 'static> {
    /// `None` once the channel has been closed.
    sender: Mutex<Option<broadcast::Sender<T>>>,
    /// Total events published.
    events_published: AtomicU64,
    /// Channel capacity.
    capacity: usize,
}

impl<T: Clone + Send + 'static> EventChannel<T> {
    /// Create a channel with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a channel with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Publish an event; returns the number of subscribers that received it.
    pub fn publish(&self, event: T) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return 0;
        };
        // Err only means nobody is listening.
        sender.send(event).unwrap_or(0)
    }

    /// Register a new listener. On a closed channel the subscription is
    /// already ended.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        let receiver = self.sender.lock().as_ref().map(broadcast::Sender::subscribe);
        debug!(open = receiver.is_some(), "State subscription created");
        Subscription::new(receiver)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Total events published since creation.
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    /// Channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Drop the sender so every subscriber observes the end of the stream.
    pub fn close(&self) {
        if self.sender.lock().take().is_some() {
            debug!("State channel closed");
        }
    }
}

impl<T: Clone + Send + 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}
