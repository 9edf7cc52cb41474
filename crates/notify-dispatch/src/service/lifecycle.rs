//! Session lifecycle and transport event handling.

use std::sync::atomic::Ordering;

use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::domain::{
    classify_close_reason, CloseClassification, ConnectionState, StateData, TransportError,
};
use crate::ports::TransportEvent;
use crate::service::MessageDispatcher;

impl MessageDispatcher {
    /// Start the transport event pump and the rate limiter sweep.
    ///
    /// Returns false when called outside a tokio runtime or after shutdown.
    pub fn start(&self) -> bool {
        if self.shut_down.load(Ordering::SeqCst) {
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available, dispatcher not started");
            return false;
        };

        let mut events = self.transport.subscribe();
        let weak = self.weak_self.clone();
        let pump = runtime.spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(dispatcher) = weak.upgrade() else {
                            break;
                        };
                        dispatcher.handle_transport_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Transport event pump lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Transport event pump stopped");
        });

        if let Some(previous) = self.pump.lock().replace(pump) {
            previous.abort();
        }
        self.limiter.spawn_sweeper();
        info!("Message dispatcher started");
        true
    }

    /// Open a session with stored credentials, or start a fresh pairing.
    ///
    /// Resets the reconnect counter. If the transport fails to connect, a
    /// reconnect is scheduled and the error is returned.
    pub async fn connect(&self) -> Result<(), TransportError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(TransportError::NoSession);
        }
        if self.connection.is_connected() {
            debug!("Already connected");
            return Ok(());
        }

        self.manual_disconnect.store(false, Ordering::SeqCst);
        self.connection.cancel_reconnect();
        self.connection
            .set_state(ConnectionState::Connecting, StateData::default());

        match self.open_session().await {
            Ok(()) => Ok(()),
            Err(e) if self.session_abandoned() => {
                debug!(error = %e, "Connect abandoned by disconnect");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Connect failed, scheduling reconnect");
                self.connection.schedule_reconnect(self.connect_fn());
                Err(e)
            }
        }
    }

    /// Close the session but keep the pairing.
    pub async fn disconnect(&self) {
        self.manual_disconnect.store(true, Ordering::SeqCst);
        self.connection.cancel_reconnect();

        let session = self.session.lock().take();
        if let Some(session) = session {
            if let Err(e) = self.transport.disconnect(&session).await {
                warn!(error = %e, "Transport disconnect failed");
            }
        }
        *self.latest_qr.lock() = None;
        self.enter_disconnected(StateData::default());
        info!("Disconnected by request");
    }

    /// Close the session, unpair the device and purge stored credentials.
    pub async fn logout(&self) {
        self.manual_disconnect.store(true, Ordering::SeqCst);
        self.connection.cancel_reconnect();

        let session = self.session.lock().take();
        if let Some(session) = session {
            if let Err(e) = self.transport.logout(&session).await {
                warn!(error = %e, "Transport logout failed");
            }
        }
        self.purge_credentials().await;
        self.clear_pairing();
        self.enter_disconnected(StateData::default());
        info!("Logged out");
    }

    /// Tear the session down, purge credentials and start a fresh pairing.
    pub async fn reset(&self) -> Result<(), TransportError> {
        info!("Resetting gateway session");
        self.logout().await;
        self.connection.reset_reconnect_attempts();
        self.connect().await
    }

    /// Stop everything: pending reconnects, the session, the event pump and
    /// the rate limiter sweep. State listeners see a final `Disconnected`
    /// and then the end of their stream.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.manual_disconnect.store(true, Ordering::SeqCst);
        self.connection.cancel_reconnect();

        let session = self.session.lock().take();
        if let Some(session) = session {
            if let Err(e) = self.transport.disconnect(&session).await {
                warn!(error = %e, "Transport disconnect failed during shutdown");
            }
        }
        self.enter_disconnected(StateData::default());

        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.connection.destroy();
        self.limiter.destroy();
        info!("Message dispatcher shut down");
    }

    /// Fold one transport event into the connection state.
    ///
    /// Called by the event pump; hosts that drive their own event loop may
    /// call it directly.
    pub async fn handle_transport_event(&self, event: TransportEvent) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        // Late output of an attempt the user already abandoned.
        if self.manual_disconnect.load(Ordering::SeqCst)
            && !matches!(event, TransportEvent::Closed { .. })
        {
            debug!("Transport event ignored after manual disconnect");
            return;
        }
        match event {
            TransportEvent::Connecting => {
                if self.connection.state() != ConnectionState::Connecting {
                    self.connection
                        .set_state(ConnectionState::Connecting, StateData::default());
                }
            }
            TransportEvent::QrCode(qr) => {
                info!("Pairing QR code received");
                *self.latest_qr.lock() = Some(qr.clone());
                self.connection
                    .set_state(ConnectionState::QrReady, StateData::qr(qr));
            }
            TransportEvent::PairingCode(code) => {
                info!("Pairing code received");
                self.connection.set_state(
                    ConnectionState::QrReady,
                    StateData {
                        pairing_code: Some(code),
                        ..StateData::default()
                    },
                );
            }
            TransportEvent::Open { phone_number } => {
                info!(
                    phone_number = phone_number.as_deref().unwrap_or("unknown"),
                    "Gateway connected"
                );
                *self.latest_qr.lock() = None;
                self.phone_number.lock().clone_from(&phone_number);
                self.connection.set_state(
                    ConnectionState::Connected,
                    StateData {
                        phone_number,
                        ..StateData::default()
                    },
                );
            }
            TransportEvent::CredentialsUpdated(credentials) => {
                if let Err(e) = self.credentials.save(&credentials).await {
                    warn!(error = %e, "Failed to persist updated credentials");
                }
            }
            TransportEvent::Closed { code, message } => self.handle_close(code, message).await,
        }
    }

    /// Open a transport session; the `Connected` state follows from events.
    pub(crate) async fn open_session(&self) -> Result<(), TransportError> {
        let credentials = match self.credentials.load().await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "Failed to load credentials, starting a fresh pairing");
                None
            }
        };
        debug!(has_credentials = credentials.is_some(), "Opening transport session");
        let session = self.transport.connect(credentials).await?;

        // Checked under the session lock that disconnect takes the handle with.
        let stored = {
            let mut slot = self.session.lock();
            if self.session_abandoned() {
                false
            } else {
                *slot = Some(session);
                true
            }
        };
        if stored {
            return Ok(());
        }

        if let Err(e) = self.transport.disconnect(&session).await {
            warn!(error = %e, "Failed to close abandoned session");
        }
        Err(TransportError::Closed {
            code: None,
            message: "session abandoned by disconnect".into(),
        })
    }

    /// Disconnect, logout or shutdown happened since the attempt started.
    fn session_abandoned(&self) -> bool {
        self.manual_disconnect.load(Ordering::SeqCst) || self.shut_down.load(Ordering::SeqCst)
    }

    async fn handle_close(&self, code: Option<u16>, message: String) {
        *self.session.lock() = None;

        if self.manual_disconnect.load(Ordering::SeqCst) {
            debug!(?code, "Session closed after manual disconnect");
            self.enter_disconnected(StateData::default());
            return;
        }

        let classification = classify_close_reason(code);
        if classification.should_reconnect() {
            info!(?code, reason = %message, "Session closed, scheduling reconnect");
            self.connection
                .set_state(ConnectionState::Disconnected, StateData::error(message));
            self.connection.schedule_reconnect(self.connect_fn());
            return;
        }

        warn!(
            ?code,
            reason = %message,
            ?classification,
            "Session invalidated, pairing required"
        );
        self.connection.cancel_reconnect();
        self.purge_credentials().await;
        self.clear_pairing();
        let reason = match classification {
            CloseClassification::VersionRejected => {
                format!("Client version rejected by gateway: {message}")
            }
            _ => format!("Session logged out, pair again: {message}"),
        };
        self.connection
            .set_state(ConnectionState::Disconnected, StateData::error(reason));
    }

    async fn purge_credentials(&self) {
        if let Err(e) = self.credentials.clear().await {
            warn!(error = %e, "Failed to purge credentials");
        }
    }

    fn enter_disconnected(&self, data: StateData) {
        if self.connection.state() != ConnectionState::Disconnected {
            self.connection.set_state(ConnectionState::Disconnected, data);
        }
    }
}
