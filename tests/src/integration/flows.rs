//! # Integration Test Flows
//!
//! Drives the runtime the way the host application does: file-backed stores
//! under a temporary data directory, the loopback transport standing in for
//! the gateway.
//!
//! ## Flows Tested
//!
//! 1. **Pair, notify, restart**: QR pairing persists credentials; a restart
//!    reconnects without pairing and the log survives
//! 2. **Shared quota**: every spelling of one number draws from one bucket
//! 3. **Session invalidation**: a logged-out close purges credentials and
//!    stops retrying until the user resets
//! 4. **Settings reload**: the notifier honors settings after invalidation

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use notify_dispatch::domain::TemplateVars;
    use notify_dispatch::{
        ConnectionEvent, ConnectionState, MessageOutcome, MessageStatus, NotificationKind,
        NotificationSettings, NotifyOutcome, SendRequest, SkipReason, Subscription,
    };
    use notify_runtime::{NotifyConfig, NotifyRuntime};
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn config_in(dir: &Path, auto_pair: bool) -> NotifyConfig {
        let mut config = NotifyConfig::default();
        config.storage.data_dir = dir.to_path_buf();
        config.transport.auto_pair = auto_pair;
        config
    }

    async fn wait_for(
        states: &mut Subscription<ConnectionEvent>,
        state: ConnectionState,
    ) -> ConnectionEvent {
        timeout(Duration::from_secs(10), async {
            loop {
                match states.recv().await {
                    Some(event) if event.state == state => return event,
                    Some(_) => continue,
                    None => panic!("state stream ended before reaching {state}"),
                }
            }
        })
        .await
        .expect("state never reached")
    }

    fn order_vars() -> TemplateVars {
        [("clinic", "Klinik Sehat"), ("order_id", "ORD-42")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // =============================================================================
    // FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_pair_notify_restart() {
        let dir = tempfile::tempdir().unwrap();

        let mut runtime = NotifyRuntime::new(config_in(dir.path(), false)).unwrap();
        let mut states = runtime.dispatcher().connection().subscribe();
        runtime.start().await;

        let qr = wait_for(&mut states, ConnectionState::QrReady).await;
        assert!(qr.qr.is_some());
        assert!(runtime.transport().complete_pairing());
        wait_for(&mut states, ConnectionState::Connected).await;

        let outcome = runtime
            .notifier()
            .notify(NotificationKind::OrderReady, "0812-3456-7890", &order_vars())
            .await
            .unwrap();
        let NotifyOutcome::Sent(receipt) = outcome else {
            panic!("expected a sent notification, got {outcome:?}");
        };
        assert_eq!(receipt.recipient.as_str(), "6281234567890");
        assert_eq!(
            runtime.transport().sent_messages()[0].content,
            "Hello Klinik Sehat, order ORD-42 is ready for pickup."
        );
        runtime.shutdown().await;

        // Same data directory: stored credentials skip the QR step.
        let mut runtime = NotifyRuntime::new(config_in(dir.path(), false)).unwrap();
        let mut states = runtime.dispatcher().connection().subscribe();
        runtime.start().await;
        wait_for(&mut states, ConnectionState::Connected).await;
        let history = runtime.dispatcher().connection().connection_history();
        assert!(history.iter().all(|e| e.state != ConnectionState::QrReady));

        let recent = runtime.recent_messages(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, MessageStatus::Sent);
        assert_eq!(recent[0].kind, NotificationKind::OrderReady);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_spellings_share_quota() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path(), true);
        config.rate_limit.max_requests = 3;

        let mut runtime = NotifyRuntime::new(config).unwrap();
        runtime.start().await;
        assert!(runtime.wait_until_connected(Duration::from_secs(10)).await);

        for raw in ["081234567890", "+62 812 3456 7890", "6281234567890"] {
            runtime
                .dispatcher()
                .send_message(SendRequest::new(raw, "hello"))
                .await
                .unwrap();
        }

        let outcome = MessageOutcome::from(
            runtime
                .dispatcher()
                .send_message(SendRequest::new("0812-3456-7890", "hello"))
                .await,
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "RATE_LIMITED");
        assert_eq!(json["retry_after_secs"], 120);

        // Throttled requests are not logged.
        assert_eq!(runtime.recent_messages(10).await.unwrap().len(), 3);
        assert_eq!(runtime.dispatcher().status().rate_limiter.blocked_keys, 1);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_logged_out_session_requires_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = NotifyRuntime::new(config_in(dir.path(), true)).unwrap();
        let mut states = runtime.dispatcher().connection().subscribe();
        runtime.start().await;
        wait_for(&mut states, ConnectionState::Connected).await;

        let credentials = runtime.config().storage.credentials_path();
        assert!(credentials.exists());

        runtime.transport().close(Some(401), "device unlinked");
        let down = wait_for(&mut states, ConnectionState::Disconnected).await;
        assert!(down.error.unwrap().contains("pair again"));
        assert!(!credentials.exists());
        assert!(!runtime.dispatcher().connection().has_pending_reconnect());

        let err = runtime
            .dispatcher()
            .send_message(SendRequest::new("081234567890", "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.code().as_str(), "NOT_CONNECTED");

        runtime.dispatcher().reset().await.unwrap();
        wait_for(&mut states, ConnectionState::QrReady).await;
        wait_for(&mut states, ConnectionState::Connected).await;
        assert!(credentials.exists());
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_settings_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = NotifyRuntime::new(config_in(dir.path(), true)).unwrap();
        runtime.start().await;
        assert!(runtime.wait_until_connected(Duration::from_secs(10)).await);

        let vars = order_vars();
        let first = runtime
            .notifier()
            .notify(NotificationKind::PaymentReceived, "081234567890", &vars)
            .await
            .unwrap();
        assert!(matches!(first, NotifyOutcome::Sent(_)));

        // Another process edits the settings file.
        let mut settings = NotificationSettings::default();
        settings.set_kind_enabled(NotificationKind::PaymentReceived, false);
        std::fs::write(
            runtime.config().storage.settings_path(),
            serde_json::to_vec(&settings).unwrap(),
        )
        .unwrap();

        let cached = runtime
            .notifier()
            .notify(NotificationKind::PaymentReceived, "081234567890", &vars)
            .await
            .unwrap();
        assert!(matches!(cached, NotifyOutcome::Sent(_)));

        runtime.reload_settings();
        let skipped = runtime
            .notifier()
            .notify(NotificationKind::PaymentReceived, "081234567890", &vars)
            .await
            .unwrap();
        assert_eq!(
            skipped,
            NotifyOutcome::Skipped(SkipReason::KindDisabled(NotificationKind::PaymentReceived))
        );
        runtime.shutdown().await;
    }
}
