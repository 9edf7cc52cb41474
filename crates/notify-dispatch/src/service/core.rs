use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::domain::{
    ConnectFn, ConnectionManager, ConnectionState, ConnectionStats, PhoneValidator,
    RateLimitConfig, RateLimiter, RateLimiterStats, ReconnectPolicy, TransportError,
};
use crate::ports::{CredentialStore, MessageLogStore, SessionHandle, TimeSource, Transport};

/// Tunables for the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Backoff policy for session reconnects.
    pub reconnect: ReconnectPolicy,
    /// Per-recipient throttling.
    pub rate_limit: RateLimitConfig,
    /// Recipient normalizer.
    pub validator: PhoneValidator,
}

/// Collaborators the dispatcher drives.
#[derive(Clone)]
pub struct DispatcherDeps {
    /// Messaging-network client.
    pub transport: Arc<dyn Transport>,
    /// Durable attempt log.
    pub log_store: Arc<dyn MessageLogStore>,
    /// Pairing credential storage.
    pub credentials: Arc<dyn CredentialStore>,
    /// Clock.
    pub time_source: Arc<dyn TimeSource>,
}

/// Point-in-time view of the dispatcher for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatcherStatus {
    /// Session state.
    pub state: ConnectionState,
    /// Session metrics.
    pub connection: ConnectionStats,
    /// Rate limiter counters.
    pub rate_limiter: RateLimiterStats,
    /// QR payload awaiting a scan.
    pub qr: Option<String>,
    /// Paired phone number.
    pub phone_number: Option<String>,
    /// Whether a transport session handle is held.
    pub has_session: bool,
}

/// Outbound message dispatcher.
///
/// Composes the phone validator, rate limiter and connection manager around a
/// transport. Owns the single gateway session: connect, disconnect, logout and
/// reset all go through here, and transport events are folded into the
/// connection state machine by [`MessageDispatcher::handle_transport_event`].
///
/// Created once by the composition root and shared as `Arc`.
pub struct MessageDispatcher {
    pub(crate) config: DispatcherConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) log_store: Arc<dyn MessageLogStore>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) time_source: Arc<dyn TimeSource>,
    pub(crate) connection: Arc<ConnectionManager>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) session: Mutex<Option<SessionHandle>>,
    /// Set by `disconnect`/`logout`; closes observed while set are expected.
    pub(crate) manual_disconnect: AtomicBool,
    pub(crate) shut_down: AtomicBool,
    pub(crate) latest_qr: Mutex<Option<String>>,
    pub(crate) phone_number: Mutex<Option<String>>,
    pub(crate) pump: Mutex<Option<JoinHandle<()>>>,
    pub(crate) weak_self: Weak<Self>,
}

impl MessageDispatcher {
    /// Create a dispatcher. Call [`MessageDispatcher::start`] before
    /// connecting so transport events are observed.
    pub fn new(config: DispatcherConfig, deps: DispatcherDeps) -> Arc<Self> {
        let connection = ConnectionManager::new(config.reconnect.clone(), deps.time_source.clone());
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit.clone(),
            deps.time_source.clone(),
        ));

        Arc::new_cyclic(|weak_self| Self {
            config,
            transport: deps.transport,
            log_store: deps.log_store,
            credentials: deps.credentials,
            time_source: deps.time_source,
            connection,
            limiter,
            session: Mutex::new(None),
            manual_disconnect: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            latest_qr: Mutex::new(None),
            phone_number: Mutex::new(None),
            pump: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Connection state machine.
    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    /// Recipient rate limiter.
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Recipient normalizer.
    pub fn validator(&self) -> &PhoneValidator {
        &self.config.validator
    }

    /// QR payload awaiting a scan, if pairing is in progress.
    pub fn latest_qr(&self) -> Option<String> {
        self.latest_qr.lock().clone()
    }

    /// Phone number of the paired account, once connected.
    pub fn phone_number(&self) -> Option<String> {
        self.phone_number.lock().clone()
    }

    /// Snapshot for status displays.
    pub fn status(&self) -> DispatcherStatus {
        DispatcherStatus {
            state: self.connection.state(),
            connection: self.connection.connection_stats(),
            rate_limiter: self.limiter.stats(),
            qr: self.latest_qr(),
            phone_number: self.phone_number(),
            has_session: self.session.lock().is_some(),
        }
    }

    /// Connect function handed to the reconnect scheduler. Holds only a weak
    /// reference so pending retries never keep a dropped dispatcher alive.
    pub(crate) fn connect_fn(&self) -> ConnectFn {
        let weak = self.weak_self.clone();
        Arc::new(move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(dispatcher) => dispatcher.open_session().await,
                    None => Err(TransportError::NoSession),
                }
            }
            .boxed()
        })
    }

    pub(crate) fn clear_pairing(&self) {
        *self.latest_qr.lock() = None;
        *self.phone_number.lock() = None;
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("state", &self.connection.state())
            .field("has_session", &self.session.lock().is_some())
            .finish_non_exhaustive()
    }
}
