//! # Loopback Transport
//!
//! In-process stand-in for the messaging gateway. It walks through the same
//! event sequence a real client produces (connecting, QR, credentials, open)
//! and records every send, so the dispatcher can be exercised end to end
//! without a network. Fault injection hooks cover the failure paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::domain::{RecipientAddress, TransportError};
use crate::ports::{Credentials, SessionHandle, Transport, TransportEvent};

const EVENT_CAPACITY: usize = 64;

/// Loopback behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Number reported when the session opens.
    pub phone_number: Option<String>,
    /// Complete QR pairing immediately instead of waiting for
    /// [`LoopbackTransport::complete_pairing`].
    pub auto_pair: bool,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            phone_number: Some("6281100000000".to_string()),
            auto_pair: false,
        }
    }
}

/// A message accepted by the loopback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Provider id handed back to the caller.
    pub provider_id: String,
    /// Canonical recipient.
    pub recipient: RecipientAddress,
    /// Message text.
    pub content: String,
}

#[derive(Debug, Default)]
struct LoopbackState {
    session: Option<SessionHandle>,
    awaiting_pairing: bool,
    unreachable: HashSet<String>,
    sent: Vec<SentMessage>,
}

/// Transport that never leaves the process.
#[derive(Debug)]
pub struct LoopbackTransport {
    config: LoopbackConfig,
    events: broadcast::Sender<TransportEvent>,
    state: Mutex<LoopbackState>,
    connect_calls: AtomicU32,
    failing_connects: AtomicU32,
    fail_sends: AtomicBool,
    fail_probes: AtomicBool,
    next_message_id: AtomicU64,
    next_pairing: AtomicU64,
}

impl LoopbackTransport {
    /// Create a loopback with `config`.
    pub fn new(config: LoopbackConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            events,
            state: Mutex::new(LoopbackState::default()),
            connect_calls: AtomicU32::new(0),
            failing_connects: AtomicU32::new(0),
            fail_sends: AtomicBool::new(false),
            fail_probes: AtomicBool::new(false),
            next_message_id: AtomicU64::new(1),
            next_pairing: AtomicU64::new(1),
        }
    }

    /// Finish a QR pairing started by `connect` without credentials.
    ///
    /// Returns false when no pairing is waiting.
    pub fn complete_pairing(&self) -> bool {
        let session = {
            let mut state = self.state.lock();
            if !state.awaiting_pairing {
                return false;
            }
            state.awaiting_pairing = false;
            state.session
        };
        if session.is_none() {
            return false;
        }
        self.pair_and_open();
        true
    }

    /// Drop the session as the gateway would, emitting `Closed`.
    pub fn close(&self, code: Option<u16>, message: impl Into<String>) {
        {
            let mut state = self.state.lock();
            state.session = None;
            state.awaiting_pairing = false;
        }
        self.emit(TransportEvent::Closed {
            code,
            message: message.into(),
        });
    }

    /// Report `recipient` as not registered on the network.
    pub fn set_unreachable(&self, recipient: &RecipientAddress) {
        self.state
            .lock()
            .unreachable
            .insert(recipient.as_str().to_string());
    }

    /// Make the next `count` connects fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Make sends fail (or succeed again).
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Make existence probes fail (or succeed again).
    pub fn set_fail_probes(&self, fail: bool) {
        self.fail_probes.store(fail, Ordering::SeqCst);
    }

    /// Messages accepted so far.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    /// Number of `connect` calls, failed ones included.
    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Whether a session is open.
    pub fn has_session(&self) -> bool {
        self.state.lock().session.is_some()
    }

    fn emit(&self, event: TransportEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    fn pair_and_open(&self) {
        let n = self.next_pairing.fetch_add(1, Ordering::Relaxed);
        self.emit(TransportEvent::CredentialsUpdated(Credentials::new(
            format!("loopback-creds-{n}"),
        )));
        self.emit(TransportEvent::Open {
            phone_number: self.config.phone_number.clone(),
        });
    }

    fn require_session(&self, session: &SessionHandle) -> Result<(), TransportError> {
        match self.state.lock().session {
            Some(current) if current == *session => Ok(()),
            _ => Err(TransportError::NoSession),
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
    ) -> Result<SessionHandle, TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(TransportEvent::Connecting);

        let failing = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            debug!("Loopback connect failing on request");
            return Err(TransportError::Network("loopback connect refused".into()));
        }

        let session = SessionHandle::new();
        let paired = credentials.is_some();
        {
            let mut state = self.state.lock();
            state.session = Some(session);
            state.awaiting_pairing = !paired && !self.config.auto_pair;
        }

        if paired {
            self.emit(TransportEvent::Open {
                phone_number: self.config.phone_number.clone(),
            });
        } else {
            let n = self.next_pairing.load(Ordering::Relaxed);
            self.emit(TransportEvent::QrCode(format!("loopback-qr-{n}")));
            if self.config.auto_pair {
                self.pair_and_open();
            }
        }
        info!(%session, paired, "Loopback session opened");
        Ok(session)
    }

    async fn send(
        &self,
        session: &SessionHandle,
        recipient: &RecipientAddress,
        content: &str,
    ) -> Result<String, TransportError> {
        self.require_session(session)?;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("loopback send refused".into()));
        }
        let provider_id = format!(
            "LOOPBACK-{}",
            self.next_message_id.fetch_add(1, Ordering::SeqCst)
        );
        self.state.lock().sent.push(SentMessage {
            provider_id: provider_id.clone(),
            recipient: recipient.clone(),
            content: content.to_string(),
        });
        Ok(provider_id)
    }

    async fn exists(
        &self,
        session: &SessionHandle,
        recipient: &RecipientAddress,
    ) -> Result<bool, TransportError> {
        self.require_session(session)?;
        if self.fail_probes.load(Ordering::SeqCst) {
            return Err(TransportError::Network("loopback probe timed out".into()));
        }
        Ok(!self.state.lock().unreachable.contains(recipient.as_str()))
    }

    // Client-initiated teardown does not echo a Closed event.
    async fn disconnect(&self, session: &SessionHandle) -> Result<(), TransportError> {
        self.require_session(session)?;
        let mut state = self.state.lock();
        state.session = None;
        state.awaiting_pairing = false;
        Ok(())
    }

    async fn logout(&self, session: &SessionHandle) -> Result<(), TransportError> {
        self.disconnect(session).await
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}
