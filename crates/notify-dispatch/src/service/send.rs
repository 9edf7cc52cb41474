use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::{
    ConnectionEvent, ConnectionState, ConnectionStats, DispatchError, MessageLogEntry,
    MessageReceipt, RateLimiterStats, RecipientAddress, SendRequest,
};
use crate::events::Subscription;
use crate::ports::NotificationApi;
use crate::service::MessageDispatcher;

impl MessageDispatcher {
    /// Validate, throttle, send and log one message.
    ///
    /// Pipeline:
    /// 1. session must be `Connected`
    /// 2. recipient is normalized; invalid input touches nothing
    /// 3. rate limit check; a throttled request is not logged
    /// 4. quota is recorded, then the recipient is probed
    /// 5. the message is sent and the attempt logged as sent or failed
    ///
    /// Sends are never retried here. Log write failures are reported as
    /// warnings and do not change the result.
    pub async fn send_message(
        &self,
        request: SendRequest,
    ) -> Result<MessageReceipt, DispatchError> {
        if !self.connection.is_connected() {
            return Err(DispatchError::NotConnected);
        }
        let Some(session) = *self.session.lock() else {
            return Err(DispatchError::NotConnected);
        };

        let recipient = self
            .config
            .validator
            .validate(&request.recipient)
            .into_address()
            .map_err(DispatchError::InvalidRecipient)?;

        let decision = self.limiter.check(recipient.as_str());
        if !decision.allowed {
            let retry_after_secs = decision.retry_after_secs.unwrap_or(0);
            debug!(recipient = %recipient, retry_after_secs, "Send throttled");
            return Err(DispatchError::RateLimited { retry_after_secs });
        }
        // The probe is a provider round-trip too, so quota is taken before it.
        self.limiter.record(recipient.as_str());

        match self.transport.exists(&session, &recipient).await {
            Ok(true) => {}
            Ok(false) => {
                let error = DispatchError::RecipientUnreachable(recipient.to_string());
                self.log_failure(&recipient, &request, &error).await;
                return Err(error);
            }
            Err(e) => {
                let error = DispatchError::Transport(e.to_string());
                self.log_failure(&recipient, &request, &error).await;
                return Err(error);
            }
        }

        match self
            .transport
            .send(&session, &recipient, &request.content)
            .await
        {
            Ok(message_id) => {
                let sent_at = self.time_source.now();
                self.append_log(MessageLogEntry::sent(
                    recipient.clone(),
                    request.kind,
                    request.content,
                    message_id.clone(),
                    sent_at,
                ))
                .await;
                info!(
                    recipient = %recipient,
                    kind = %request.kind,
                    message_id = %message_id,
                    "Message sent"
                );
                Ok(MessageReceipt {
                    message_id,
                    recipient,
                    sent_at,
                })
            }
            Err(e) => {
                let error = DispatchError::Transport(e.to_string());
                self.log_failure(&recipient, &request, &error).await;
                Err(error)
            }
        }
    }

    async fn log_failure(
        &self,
        recipient: &RecipientAddress,
        request: &SendRequest,
        error: &DispatchError,
    ) {
        warn!(
            recipient = %recipient,
            kind = %request.kind,
            code = %error.code(),
            error = %error,
            "Message send failed"
        );
        self.append_log(MessageLogEntry::failed(
            recipient.clone(),
            request.kind,
            request.content.clone(),
            error.to_string(),
            self.time_source.now(),
        ))
        .await;
    }

    async fn append_log(&self, entry: MessageLogEntry) {
        let id = entry.id;
        if let Err(e) = self.log_store.append(entry).await {
            warn!(entry_id = %id, error = %e, "Failed to append message log entry");
        }
    }
}

#[async_trait]
impl NotificationApi for MessageDispatcher {
    async fn send_message(&self, request: SendRequest) -> Result<MessageReceipt, DispatchError> {
        MessageDispatcher::send_message(self, request).await
    }

    fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    fn connection_stats(&self) -> ConnectionStats {
        self.connection.connection_stats()
    }

    fn rate_limiter_stats(&self) -> RateLimiterStats {
        self.limiter.stats()
    }

    fn subscribe_state(&self) -> Subscription<ConnectionEvent> {
        self.connection.subscribe()
    }
}
