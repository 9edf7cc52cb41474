//! Connection manager implementation.

use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::ReconnectPolicy;
use super::history::{EventHistory, HISTORY_CAPACITY};
use super::types::{ConnectionEvent, ConnectionState, ConnectionStats, StateData};
use crate::domain::TransportError;
use crate::events::{EventChannel, Subscription};
use crate::ports::TimeSource;

/// Connect function handed to the reconnect scheduler.
///
/// Resolves once the transport has a session handle; the `Connected` state
/// itself arrives later through transport events.
pub type ConnectFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), TransportError>> + Send + Sync>;

/// Mutable state guarded by the manager's mutex.
struct ManagerInner {
    state: ConnectionState,
    history: EventHistory,
    attempts: u32,
    /// Task of the scheduled attempt, armed or running.
    pending: Option<JoinHandle<()>>,
    /// A scheduled attempt is currently running its connect function.
    in_flight: bool,
    /// Bumped on every cancellation; stale attempts compare against it.
    epoch: u64,
    destroyed: bool,
}

/// Connection state machine plus reconnect scheduler.
///
/// Owns no network code. Transitions are totally ordered by a single mutex,
/// and at most one scheduled attempt (armed timer or running connect) exists
/// at any time.
pub struct ConnectionManager {
    inner: Mutex<ManagerInner>,
    policy: ReconnectPolicy,
    events: EventChannel<ConnectionEvent>,
    time_source: Arc<dyn TimeSource>,
    weak_self: Weak<Self>,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state.
    pub fn new(policy: ReconnectPolicy, time_source: Arc<dyn TimeSource>) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            inner: Mutex::new(ManagerInner {
                state: ConnectionState::Disconnected,
                history: EventHistory::new(HISTORY_CAPACITY),
                attempts: 0,
                pending: None,
                in_flight: false,
                epoch: 0,
                destroyed: false,
            }),
            policy,
            events: EventChannel::new(),
            time_source,
            weak_self: weak_self.clone(),
        })
    }

    /// Reconnect policy in use.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Record a transition, notify subscribers, then apply entry effects.
    pub fn set_state(&self, state: ConnectionState, data: StateData) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, state, data);
    }

    /// Schedule the next reconnect attempt under the backoff policy.
    ///
    /// Cancels any armed timer first. Once `max_attempts` is reached the
    /// manager enters `Error`, resets the counter and stops scheduling until an
    /// external trigger calls this again.
    pub fn schedule_reconnect(&self, connect: ConnectFn) {
        let mut inner = self.inner.lock();
        if inner.destroyed {
            return;
        }
        if inner.in_flight {
            debug!("Reconnect attempt already in flight, not rescheduling");
            return;
        }
        Self::cancel_pending(&mut inner, true);

        if inner.attempts >= self.policy.max_attempts {
            let attempts = inner.attempts;
            inner.attempts = 0;
            warn!(attempts, "Reconnect attempts exhausted");
            self.transition(
                &mut inner,
                ConnectionState::Error,
                StateData::error(format!(
                    "Reconnection failed after {attempts} attempts; reconnect manually"
                )),
            );
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, reconnect not scheduled");
            self.transition(
                &mut inner,
                ConnectionState::Error,
                StateData::error("Reconnect scheduler has no runtime"),
            );
            return;
        };

        let delay = self.policy.delay_for(inner.attempts);
        inner.attempts += 1;
        let attempt = inner.attempts;
        let epoch = inner.epoch;
        self.transition(&mut inner, ConnectionState::Reconnecting, StateData::default());

        info!(
            attempt,
            max_attempts = self.policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );

        let weak = self.weak_self.clone();
        inner.pending = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(manager) = weak.upgrade() else {
                return;
            };
            if !manager.begin_attempt(epoch) {
                return;
            }
            let result = connect().await;
            manager.finish_attempt(epoch, attempt, result, connect);
        }));
    }

    /// Cancel any scheduled or running reconnect and reset the counter.
    ///
    /// A running attempt is aborted along with its connect call.
    pub fn cancel_reconnect(&self) {
        let mut inner = self.inner.lock();
        if Self::cancel_pending(&mut inner, true) {
            debug!("Pending reconnect cancelled");
        }
        inner.attempts = 0;
    }

    /// Reset the reconnect counter to zero.
    pub fn reset_reconnect_attempts(&self) {
        self.inner.lock().attempts = 0;
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// True while the session is live.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// True while a session is being established.
    pub fn is_connecting(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::QrReady | ConnectionState::Reconnecting
        )
    }

    /// Reconnect attempts since the last reset.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lock().attempts
    }

    /// True when a reconnect timer is armed or an attempt is running.
    pub fn has_pending_reconnect(&self) -> bool {
        let inner = self.inner.lock();
        inner.pending.is_some() || inner.in_flight
    }

    /// Copy of the bounded history, oldest first.
    pub fn connection_history(&self) -> Vec<ConnectionEvent> {
        self.inner.lock().history.to_vec()
    }

    /// Derived metrics for status displays.
    pub fn connection_stats(&self) -> ConnectionStats {
        let now = self.time_source.now();
        let inner = self.inner.lock();
        let last_connected = inner
            .history
            .last_in_state(ConnectionState::Connected)
            .map(|e| e.timestamp);
        let last_disconnected = inner
            .history
            .last_in_state(ConnectionState::Disconnected)
            .map(|e| e.timestamp);
        let uptime = match (inner.state, last_connected) {
            (ConnectionState::Connected, Some(since)) => Some(now.since(since)),
            _ => None,
        };

        ConnectionStats {
            current_state: inner.state,
            reconnect_attempts: inner.attempts,
            total_events: inner.history.len(),
            uptime,
            last_connected,
            last_disconnected,
            last_error: inner.history.last_error().map(str::to_owned),
        }
    }

    /// Listen for state changes.
    pub fn subscribe(&self) -> Subscription<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Number of live state listeners.
    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    /// Cancel timers and drop every listener. Further scheduling is ignored.
    pub fn destroy(&self) {
        {
            let mut inner = self.inner.lock();
            inner.destroyed = true;
            Self::cancel_pending(&mut inner, true);
            inner.attempts = 0;
        }
        self.events.close();
        debug!("Connection manager destroyed");
    }

    fn transition(&self, inner: &mut ManagerInner, state: ConnectionState, data: StateData) {
        let previous = inner.state;
        let event = ConnectionEvent::new(state, self.time_source.now(), data);
        inner.history.push(event.clone());
        inner.state = state;
        debug!(from = %previous, to = %state, "Connection state changed");
        self.events.publish(event);

        match state {
            ConnectionState::Connected => {
                inner.attempts = 0;
                Self::cancel_pending(inner, false);
            }
            ConnectionState::Disconnected if previous != ConnectionState::Reconnecting => {
                Self::cancel_pending(inner, false);
            }
            _ => {}
        }
    }

    /// Abort the armed timer. A running attempt is aborted when
    /// `abort_in_flight` is set and otherwise left to finish as an orphan
    /// whose result is ignored.
    fn cancel_pending(inner: &mut ManagerInner, abort_in_flight: bool) -> bool {
        let had_pending = inner.pending.is_some() || inner.in_flight;
        if let Some(handle) = inner.pending.take() {
            if abort_in_flight || !inner.in_flight {
                handle.abort();
            }
        }
        inner.in_flight = false;
        inner.epoch = inner.epoch.wrapping_add(1);
        had_pending
    }

    fn begin_attempt(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.destroyed || inner.epoch != epoch {
            return false;
        }
        inner.in_flight = true;
        true
    }

    fn finish_attempt(
        &self,
        epoch: u64,
        attempt: u32,
        result: Result<(), TransportError>,
        connect: ConnectFn,
    ) {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            debug!(attempt, "Reconnect attempt superseded, result ignored");
            return;
        }
        // Our own task; dropping the handle detaches it.
        inner.pending = None;
        inner.in_flight = false;

        match result {
            Ok(()) => {
                info!(attempt, "Reconnect attempt succeeded");
                inner.attempts = 0;
            }
            Err(error) => {
                warn!(attempt, error = %error, "Reconnect attempt failed");
                drop(inner);
                self.schedule_reconnect(connect);
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ConnectionManager")
            .field("state", &inner.state)
            .field("attempts", &inner.attempts)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
