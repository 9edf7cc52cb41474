//! # Driving Port (Inbound API)
//!
//! The API the host application uses to send notifications and observe the
//! gateway session.

use async_trait::async_trait;

use crate::domain::{
    ConnectionEvent, ConnectionState, ConnectionStats, DispatchError, MessageReceipt,
    RateLimiterStats, SendRequest,
};
use crate::events::Subscription;

/// Primary API of the notification subsystem.
///
/// # Example
///
/// ```rust,ignore
/// use notify_dispatch::ports::NotificationApi;
/// use notify_dispatch::domain::{MessageOutcome, SendRequest};
///
/// async fn notify<T: NotificationApi>(api: &T) -> MessageOutcome {
///     let request = SendRequest::new("0812-3456-7890", "Your order is ready");
///     api.send_message(request).await.into()
/// }
/// ```
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Validate, throttle, send and log one message.
    ///
    /// # Errors
    ///
    /// - `NotConnected` - session is not live; nothing is recorded
    /// - `InvalidRecipient` - recipient did not normalize; nothing is recorded
    /// - `RateLimited` - recipient is throttled; nothing is logged
    /// - `RecipientUnreachable` - probe says the recipient is not registered
    /// - `Transport` - probe or send failed at the provider
    async fn send_message(&self, request: SendRequest) -> Result<MessageReceipt, DispatchError>;

    /// Current session state.
    fn connection_state(&self) -> ConnectionState;

    /// Session metrics for status displays.
    fn connection_stats(&self) -> ConnectionStats;

    /// Rate limiter counters.
    fn rate_limiter_stats(&self) -> RateLimiterStats;

    /// Stream of session state changes.
    fn subscribe_state(&self) -> Subscription<ConnectionEvent>;
}
