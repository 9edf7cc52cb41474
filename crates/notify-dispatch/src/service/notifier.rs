//! Settings-gated notifications for business events.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::domain::{
    render_template, DispatchError, MessageReceipt, NotificationKind, SendRequest, StoreError,
    TemplateVars,
};
use crate::ports::{NotificationApi, SettingsStore};

/// Why a notification was not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Notifications are switched off entirely.
    NotificationsDisabled,
    /// This kind is switched off.
    KindDisabled(NotificationKind),
}

/// Result of a notification request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Message went out.
    Sent(MessageReceipt),
    /// Settings say not to send.
    Skipped(SkipReason),
}

/// Notification failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Settings could not be read.
    #[error("Failed to load notification settings: {0}")]
    Settings(#[from] StoreError),

    /// The send itself failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Decides whether a business event produces a message, renders it from the
/// configured template, and hands it to the dispatcher.
pub struct Notifier {
    api: Arc<dyn NotificationApi>,
    settings: Arc<dyn SettingsStore>,
}

impl Notifier {
    /// Create a notifier over a dispatcher and a settings store.
    pub fn new(api: Arc<dyn NotificationApi>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { api, settings }
    }

    /// Render the message `kind` would produce, without sending.
    pub async fn preview(
        &self,
        kind: NotificationKind,
        vars: &TemplateVars,
    ) -> Result<String, NotifyError> {
        let settings = self.settings.load().await?;
        Ok(render_template(settings.template(kind), vars))
    }

    /// Send the `kind` notification to `recipient` if settings allow it.
    pub async fn notify(
        &self,
        kind: NotificationKind,
        recipient: &str,
        vars: &TemplateVars,
    ) -> Result<NotifyOutcome, NotifyError> {
        let settings = self.settings.load().await?;
        if !settings.enabled {
            debug!(%kind, "Notifications disabled, skipping");
            return Ok(NotifyOutcome::Skipped(SkipReason::NotificationsDisabled));
        }
        if !settings.is_enabled(kind) {
            debug!(%kind, "Notification kind disabled, skipping");
            return Ok(NotifyOutcome::Skipped(SkipReason::KindDisabled(kind)));
        }

        let content = render_template(settings.template(kind), vars);
        let request = SendRequest::new(recipient, content).with_kind(kind);
        let receipt = self.api.send_message(request).await?;
        Ok(NotifyOutcome::Sent(receipt))
    }
}
