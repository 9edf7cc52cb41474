use super::*;
use crate::adapters::{
    InMemoryCredentialStore, InMemoryMessageLogStore, InMemorySettingsStore, LoopbackConfig,
    LoopbackTransport, ManualTimeSource,
};
use crate::domain::{
    ConnectionEvent, ConnectionState, DispatchError, MessageStatus, NotificationKind,
    NotificationSettings, PhoneValidator, RecipientAddress, SendRequest, TemplateVars, Timestamp,
    TransportError,
};
use crate::events::Subscription;
use crate::ports::{
    CredentialStore, Credentials, NotificationApi, SessionHandle, Transport, TransportEvent,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

struct Harness {
    dispatcher: Arc<MessageDispatcher>,
    transport: Arc<LoopbackTransport>,
    log: Arc<InMemoryMessageLogStore>,
    credentials: Arc<InMemoryCredentialStore>,
    states: Subscription<ConnectionEvent>,
}

/// Loopback whose `connect` takes `delay` before reaching the gateway.
struct SlowConnect {
    inner: Arc<LoopbackTransport>,
    delay: Duration,
}

#[async_trait]
impl Transport for SlowConnect {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<SessionHandle, TransportError> {
        sleep(self.delay).await;
        self.inner.connect(credentials).await
    }

    async fn send(
        &self,
        session: &SessionHandle,
        recipient: &RecipientAddress,
        content: &str,
    ) -> Result<String, TransportError> {
        self.inner.send(session, recipient, content).await
    }

    async fn exists(
        &self,
        session: &SessionHandle,
        recipient: &RecipientAddress,
    ) -> Result<bool, TransportError> {
        self.inner.exists(session, recipient).await
    }

    async fn disconnect(&self, session: &SessionHandle) -> Result<(), TransportError> {
        self.inner.disconnect(session).await
    }

    async fn logout(&self, session: &SessionHandle) -> Result<(), TransportError> {
        self.inner.logout(session).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.subscribe()
    }
}

fn harness_with(loopback: LoopbackConfig, credentials: InMemoryCredentialStore) -> Harness {
    let transport = Arc::new(LoopbackTransport::new(loopback));
    harness_over(transport.clone(), transport, credentials)
}

/// Auto-pairing loopback behind a connect delay.
fn slow_harness(delay: Duration) -> Harness {
    let transport = Arc::new(LoopbackTransport::new(LoopbackConfig {
        auto_pair: true,
        ..LoopbackConfig::default()
    }));
    let wire = Arc::new(SlowConnect {
        inner: transport.clone(),
        delay,
    });
    harness_over(transport, wire, InMemoryCredentialStore::default())
}

fn harness_over(
    transport: Arc<LoopbackTransport>,
    wire: Arc<dyn Transport>,
    credentials: InMemoryCredentialStore,
) -> Harness {
    let log = Arc::new(InMemoryMessageLogStore::new());
    let credentials = Arc::new(credentials);
    let clock = ManualTimeSource::new(Timestamp::from_millis(1_700_000_000_000));

    let dispatcher = MessageDispatcher::new(
        DispatcherConfig::default(),
        DispatcherDeps {
            transport: wire,
            log_store: log.clone(),
            credentials: credentials.clone(),
            time_source: Arc::new(clock),
        },
    );
    let states = dispatcher.connection().subscribe();
    assert!(dispatcher.start());

    Harness {
        dispatcher,
        transport,
        log,
        credentials,
        states,
    }
}

fn harness() -> Harness {
    harness_with(LoopbackConfig::default(), InMemoryCredentialStore::default())
}

fn address(raw: &str) -> RecipientAddress {
    PhoneValidator::default()
        .validate(raw)
        .into_address()
        .unwrap()
}

async fn wait_for(
    states: &mut Subscription<ConnectionEvent>,
    state: ConnectionState,
) -> ConnectionEvent {
    timeout(Duration::from_secs(600), async {
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

/// Fresh pairing: connect, scan the QR, wait for the session to open.
async fn paired(h: &mut Harness) {
    h.dispatcher.connect().await.unwrap();
    wait_for(&mut h.states, ConnectionState::QrReady).await;
    assert!(h.transport.complete_pairing());
    wait_for(&mut h.states, ConnectionState::Connected).await;
}

// ============================================================
// SEND PIPELINE
// ============================================================

#[tokio::test]
async fn test_pair_then_send() {
    let mut h = harness();

    h.dispatcher.connect().await.unwrap();
    let qr = wait_for(&mut h.states, ConnectionState::QrReady).await;
    assert!(qr.qr.is_some());
    assert_eq!(h.dispatcher.latest_qr(), qr.qr);

    assert!(h.transport.complete_pairing());
    wait_for(&mut h.states, ConnectionState::Connected).await;
    assert!(h.credentials.has_credentials());
    assert_eq!(h.dispatcher.latest_qr(), None);
    assert_eq!(h.dispatcher.phone_number().as_deref(), Some("6281100000000"));

    let receipt = h
        .dispatcher
        .send_message(SendRequest::new("0812-3456-7890", "Your order is ready"))
        .await
        .unwrap();
    assert_eq!(receipt.recipient.as_str(), "6281234567890");
    assert_eq!(receipt.message_id, "LOOPBACK-1");

    let entries = h.log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, MessageStatus::Sent);
    assert_eq!(entries[0].provider_message_id.as_deref(), Some("LOOPBACK-1"));
    assert!(entries[0].sent_at.is_some());

    let status = h.dispatcher.status();
    assert_eq!(status.state, ConnectionState::Connected);
    assert!(status.has_session);
    assert_eq!(status.rate_limiter.total_requests, 1);
}

#[tokio::test]
async fn test_send_requires_connection() {
    let h = harness();
    let err = h
        .dispatcher
        .send_message(SendRequest::new("081234567890", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::NotConnected);
    assert!(h.log.is_empty());
    assert_eq!(h.dispatcher.rate_limiter().stats().tracked_keys, 0);
}

#[tokio::test]
async fn test_invalid_recipient_records_nothing() {
    let mut h = harness();
    paired(&mut h).await;

    for raw in ["", "phone: abc", "0123"] {
        let err = h
            .dispatcher
            .send_message(SendRequest::new(raw, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRecipient(_)), "{raw}");
    }
    assert!(h.log.is_empty());
    assert_eq!(h.dispatcher.rate_limiter().stats().tracked_keys, 0);
    assert!(h.transport.sent_messages().is_empty());
}

#[tokio::test]
async fn test_spellings_share_one_quota() {
    let mut h = harness();
    paired(&mut h).await;

    let spellings = ["081234567890", "+62 812-3456-7890", "6281234567890"];
    for n in 0..20 {
        let raw = spellings[n % spellings.len()];
        h.dispatcher
            .send_message(SendRequest::new(raw, format!("m{n}")))
            .await
            .unwrap();
    }

    let err = h
        .dispatcher
        .send_message(SendRequest::new("0812 3456 7890", "one too many"))
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::RateLimited { retry_after_secs: 120 });
    assert_eq!(h.log.len(), 20);
    assert_eq!(h.transport.sent_messages().len(), 20);

    // Other recipients are unaffected.
    h.dispatcher
        .send_message(SendRequest::new("081298765432", "hi"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unreachable_recipient_is_logged_and_counted() {
    let mut h = harness();
    paired(&mut h).await;
    let to = address("081234567890");
    h.transport.set_unreachable(&to);

    let err = h
        .dispatcher
        .send_message(SendRequest::new("081234567890", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err, DispatchError::RecipientUnreachable("6281234567890".into()));

    let failed = h.log.entries();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, MessageStatus::Failed);
    assert_eq!(failed[0].recipient, to);
    assert_eq!(h.dispatcher.rate_limiter().check(to.as_str()).remaining, 18);
    assert!(h.transport.sent_messages().is_empty());
}

#[tokio::test]
async fn test_transport_failures_are_logged() {
    let mut h = harness();
    paired(&mut h).await;

    h.transport.set_fail_probes(true);
    let err = h
        .dispatcher
        .send_message(SendRequest::new("081234567890", "probe"))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Transport(_)));

    h.transport.set_fail_probes(false);
    h.transport.set_fail_sends(true);
    let err = h
        .dispatcher
        .send_message(SendRequest::new("081234567890", "send"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("loopback send refused"));

    let entries = h.log.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == MessageStatus::Failed));
    assert!(entries[1]
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("loopback send refused")));
}

#[tokio::test]
async fn test_log_failure_does_not_fail_send() {
    let mut h = harness();
    paired(&mut h).await;
    h.log.set_fail_appends(true);

    let receipt = h
        .dispatcher
        .send_message(SendRequest::new("081234567890", "hi"))
        .await;
    assert!(receipt.is_ok());
    assert!(h.log.is_empty());
}

#[tokio::test]
async fn test_api_trait_object() {
    let mut h = harness();
    paired(&mut h).await;
    let api: Arc<dyn NotificationApi> = h.dispatcher.clone();

    assert_eq!(api.connection_state(), ConnectionState::Connected);
    let outcome: crate::domain::MessageOutcome = api
        .send_message(SendRequest::new("0123", "hi"))
        .await
        .into();
    assert!(!outcome.success);
    assert_eq!(outcome.error_code.map(|c| c.as_str()), Some("INVALID_RECIPIENT"));
}

// ============================================================
// SESSION LIFECYCLE
// ============================================================

#[tokio::test]
async fn test_stored_credentials_skip_pairing() {
    let mut h = harness_with(
        LoopbackConfig::default(),
        InMemoryCredentialStore::with_credentials(Credentials::new("stored")),
    );
    h.dispatcher.connect().await.unwrap();
    wait_for(&mut h.states, ConnectionState::Connected).await;

    let history = h.dispatcher.connection().connection_history();
    assert!(history.iter().all(|e| e.state != ConnectionState::QrReady));
}

#[tokio::test]
async fn test_connect_when_connected_is_noop() {
    let mut h = harness();
    paired(&mut h).await;
    h.dispatcher.connect().await.unwrap();
    assert_eq!(h.transport.connect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_logged_out_close_purges_and_stops() {
    let mut h = harness();
    paired(&mut h).await;
    assert!(h.credentials.has_credentials());

    h.transport.close(Some(401), "device removed");
    let event = wait_for(&mut h.states, ConnectionState::Disconnected).await;
    assert!(event.error.unwrap().contains("pair again"));
    assert!(!h.credentials.has_credentials());
    assert!(!h.dispatcher.connection().has_pending_reconnect());
    assert_eq!(h.dispatcher.phone_number(), None);

    sleep(Duration::from_secs(300)).await;
    assert_eq!(h.transport.connect_calls(), 1);
    assert_eq!(h.dispatcher.connection().state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_version_rejected_close_is_terminal() {
    let mut h = harness();
    paired(&mut h).await;

    h.transport.close(Some(405), "outdated client");
    let event = wait_for(&mut h.states, ConnectionState::Disconnected).await;
    assert!(event.error.unwrap().contains("version rejected"));
    assert!(!h.dispatcher.connection().has_pending_reconnect());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_session_reconnects() {
    let mut h = harness();
    paired(&mut h).await;

    h.transport.close(Some(428), "connection lost");
    let dropped = wait_for(&mut h.states, ConnectionState::Disconnected).await;
    assert_eq!(dropped.error.as_deref(), Some("connection lost"));
    wait_for(&mut h.states, ConnectionState::Reconnecting).await;

    // Stored credentials from the pairing let the retry open directly.
    wait_for(&mut h.states, ConnectionState::Connected).await;
    assert_eq!(h.transport.connect_calls(), 2);
    assert_eq!(h.dispatcher.connection().reconnect_attempts(), 0);

    h.dispatcher
        .send_message(SendRequest::new("081234567890", "back online"))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_connect_schedules_reconnect() {
    let mut h = harness_with(
        LoopbackConfig {
            auto_pair: true,
            ..LoopbackConfig::default()
        },
        InMemoryCredentialStore::default(),
    );
    h.transport.fail_next_connects(1);

    assert!(h.dispatcher.connect().await.is_err());
    assert_eq!(h.dispatcher.connection().state(), ConnectionState::Reconnecting);
    assert!(h.dispatcher.connection().has_pending_reconnect());

    wait_for(&mut h.states, ConnectionState::Connected).await;
    assert_eq!(h.transport.connect_calls(), 2);
    assert!(h.credentials.has_credentials());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let h = harness();
    h.transport.fail_next_connects(1);
    assert!(h.dispatcher.connect().await.is_err());
    assert!(h.dispatcher.connection().has_pending_reconnect());

    h.dispatcher.disconnect().await;
    assert!(!h.dispatcher.connection().has_pending_reconnect());
    assert_eq!(h.dispatcher.connection().state(), ConnectionState::Disconnected);

    sleep(Duration::from_secs(300)).await;
    assert_eq!(h.transport.connect_calls(), 1);
    assert_eq!(h.dispatcher.connection().state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_reconnect_in_flight() {
    let h = slow_harness(Duration::from_secs(2));
    h.transport.fail_next_connects(1);

    // First connect fails at t=2s; the retry fires at t=5s and is still
    // inside the slow connect at t=6s.
    assert!(h.dispatcher.connect().await.is_err());
    sleep(Duration::from_secs(4)).await;
    assert!(h.dispatcher.connection().has_pending_reconnect());
    assert_eq!(h.transport.connect_calls(), 1);

    h.dispatcher.disconnect().await;
    assert!(!h.dispatcher.connection().has_pending_reconnect());

    sleep(Duration::from_secs(300)).await;
    assert_eq!(h.dispatcher.connection().state(), ConnectionState::Disconnected);
    assert_eq!(h.transport.connect_calls(), 1);
    assert!(!h.transport.has_session());
    assert!(!h.dispatcher.status().has_session);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_manual_connect_closes_late_session() {
    let h = slow_harness(Duration::from_secs(2));

    let dispatcher = h.dispatcher.clone();
    let connecting = tokio::spawn(async move { dispatcher.connect().await });
    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.dispatcher.connection().state(), ConnectionState::Connecting);

    h.dispatcher.disconnect().await;
    let result = connecting.await.unwrap();
    assert!(matches!(result, Err(TransportError::Closed { .. })));

    // The gateway did open a session, and auto-paired it, after the disconnect.
    assert_eq!(h.transport.connect_calls(), 1);
    sleep(Duration::from_secs(300)).await;

    assert_eq!(h.dispatcher.connection().state(), ConnectionState::Disconnected);
    assert!(!h.dispatcher.connection().has_pending_reconnect());
    assert!(!h.transport.has_session());
    assert!(!h.dispatcher.status().has_session);
    assert_eq!(h.dispatcher.latest_qr(), None);
    assert_eq!(h.dispatcher.phone_number(), None);
    assert!(!h.credentials.has_credentials());
}

#[tokio::test]
async fn test_disconnect_keeps_pairing() {
    let mut h = harness();
    paired(&mut h).await;

    h.dispatcher.disconnect().await;
    assert_eq!(h.dispatcher.connection().state(), ConnectionState::Disconnected);
    assert!(!h.transport.has_session());
    assert!(h.credentials.has_credentials());

    h.dispatcher.connect().await.unwrap();
    wait_for(&mut h.states, ConnectionState::Connected).await;
}

#[tokio::test]
async fn test_logout_purges_credentials() {
    let mut h = harness();
    paired(&mut h).await;

    h.dispatcher.logout().await;
    assert_eq!(h.dispatcher.connection().state(), ConnectionState::Disconnected);
    assert!(!h.credentials.has_credentials());
    assert_eq!(h.dispatcher.phone_number(), None);
    assert!(!h.dispatcher.status().has_session);
}

#[tokio::test]
async fn test_reset_starts_fresh_pairing() {
    let mut h = harness();
    paired(&mut h).await;

    h.dispatcher.reset().await.unwrap();
    wait_for(&mut h.states, ConnectionState::QrReady).await;
    assert!(h.dispatcher.latest_qr().is_some());
    assert!(!h.credentials.has_credentials());
    assert_eq!(h.transport.connect_calls(), 2);
}

#[tokio::test]
async fn test_shutdown_ends_state_stream() {
    let mut h = harness();
    paired(&mut h).await;

    h.dispatcher.shutdown().await;
    h.dispatcher.shutdown().await;

    let mut last = None;
    while let Some(event) = h.states.recv().await {
        last = Some(event.state);
    }
    assert_eq!(last, Some(ConnectionState::Disconnected));
    assert!(!h.dispatcher.rate_limiter().is_sweeping());
    assert!(!h.dispatcher.start());
    assert!(h.dispatcher.connect().await.is_err());
    assert_eq!(
        h.dispatcher
            .send_message(SendRequest::new("081234567890", "hi"))
            .await,
        Err(DispatchError::NotConnected)
    );
}

#[tokio::test]
async fn test_credential_updates_are_persisted() {
    let mut h = harness();
    paired(&mut h).await;
    h.dispatcher
        .handle_transport_event(crate::ports::TransportEvent::CredentialsUpdated(
            Credentials::new("rotated"),
        ))
        .await;
    assert_eq!(
        h.credentials.load().await.unwrap(),
        Some(Credentials::new("rotated"))
    );
}

// ============================================================
// NOTIFIER
// ============================================================

fn vars(pairs: &[(&str, &str)]) -> TemplateVars {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[tokio::test]
async fn test_notifier_respects_switches() {
    let mut h = harness();
    paired(&mut h).await;

    let mut settings = NotificationSettings::default();
    settings.enabled = false;
    let store = Arc::new(InMemorySettingsStore::new(settings.clone()));
    let notifier = Notifier::new(h.dispatcher.clone(), store.clone());

    let outcome = notifier
        .notify(NotificationKind::OrderReady, "081234567890", &vars(&[]))
        .await
        .unwrap();
    assert_eq!(outcome, NotifyOutcome::Skipped(SkipReason::NotificationsDisabled));

    settings.enabled = true;
    settings.set_kind_enabled(NotificationKind::OrderReady, false);
    crate::ports::SettingsStore::save(store.as_ref(), &settings)
        .await
        .unwrap();
    let outcome = notifier
        .notify(NotificationKind::OrderReady, "081234567890", &vars(&[]))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        NotifyOutcome::Skipped(SkipReason::KindDisabled(NotificationKind::OrderReady))
    );
    assert!(h.transport.sent_messages().is_empty());
}

#[tokio::test]
async fn test_notifier_renders_and_sends() {
    let mut h = harness();
    paired(&mut h).await;
    let notifier = Notifier::new(
        h.dispatcher.clone(),
        Arc::new(InMemorySettingsStore::default()),
    );
    let values = vars(&[("clinic", "Klinik Sehat"), ("order_id", "ORD-7")]);

    let preview = notifier
        .preview(NotificationKind::OrderReady, &values)
        .await
        .unwrap();
    assert_eq!(preview, "Hello Klinik Sehat, order ORD-7 is ready for pickup.");

    let outcome = notifier
        .notify(NotificationKind::OrderReady, "081234567890", &values)
        .await
        .unwrap();
    assert!(matches!(outcome, NotifyOutcome::Sent(_)));

    let sent = h.transport.sent_messages();
    assert_eq!(sent[0].content, preview);
    assert_eq!(h.log.entries()[0].kind, NotificationKind::OrderReady);
}

#[tokio::test]
async fn test_notifier_surfaces_dispatch_errors() {
    let h = harness();
    let notifier = Notifier::new(
        h.dispatcher.clone(),
        Arc::new(InMemorySettingsStore::default()),
    );
    let err = notifier
        .notify(NotificationKind::PaymentReminder, "081234567890", &vars(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Dispatch(DispatchError::NotConnected)));
}
