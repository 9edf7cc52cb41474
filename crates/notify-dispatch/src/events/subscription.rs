//! Subscription handle.

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The channel was closed.
    #[error("Event channel closed")]
    Closed,
}

/// A listener registration. Dropping it unsubscribes.
pub struct Subscription<T: Clone> {
    receiver: Option<broadcast::Receiver<T>>,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(receiver: Option<broadcast::Receiver<T>>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the channel is closed or the subscription was
    /// created on a closed channel.
    pub async fn recv(&mut self) -> Option<T> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "State subscriber lagged, events skipped");
                }
            }
        }
    }

    /// Take the next event if one is buffered.
    pub fn try_recv(&mut self) -> Result<Option<T>, SubscriptionError> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(SubscriptionError::Closed);
        };
        loop {
            match receiver.try_recv() {
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            }
        }
    }

    /// Explicitly remove this listener.
    pub fn unsubscribe(mut self) {
        self.receiver = None;
    }
}
