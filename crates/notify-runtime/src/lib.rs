//! # Notify Runtime
//!
//! Composition root for the notification subsystem.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, file, environment)
//! 2. Open the file-backed stores under the data directory
//! 3. Build the dispatcher around the transport
//! 4. Start the event pump, rate-limit sweep and state logger
//! 5. Connect (reconnects are scheduled on failure)
//!
//! ## Modular Structure
//!
//! - `config/` - `NotifyConfig` loading and validation

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use notify_dispatch::adapters::{
    CachedSettingsStore, FileCredentialStore, FileSettingsStore, JsonlMessageLogStore,
    LoopbackTransport, SystemTimeSource,
};
use notify_dispatch::domain::ConnectionState;
use notify_dispatch::{
    DispatcherDeps, MessageDispatcher, MessageLogEntry, MessageLogStore, Notifier,
    SettingsStore, StoreError,
};
use notify_telemetry::{log_event, log_state_event};
use tokio::task::JoinHandle;

pub use config::{ConfigError, NotifyConfig};

/// The wired-up notification subsystem.
pub struct NotifyRuntime {
    config: NotifyConfig,
    dispatcher: Arc<MessageDispatcher>,
    transport: Arc<LoopbackTransport>,
    log_store: Arc<JsonlMessageLogStore>,
    settings: Arc<CachedSettingsStore>,
    notifier: Notifier,
    state_logger: Option<JoinHandle<()>>,
}

impl NotifyRuntime {
    /// Wire every component from `config`. Nothing runs until [`start`].
    ///
    /// [`start`]: NotifyRuntime::start
    pub fn new(config: NotifyConfig) -> Result<Self, ConfigError> {
        let dispatcher_config = config.dispatcher_config()?;
        let storage = &config.storage;

        let transport = Arc::new(LoopbackTransport::new(config.loopback_config()));
        let log_store = Arc::new(JsonlMessageLogStore::new(storage.message_log_path()));
        let settings = Arc::new(CachedSettingsStore::new(Arc::new(FileSettingsStore::new(
            storage.settings_path(),
        ))));

        let dispatcher = MessageDispatcher::new(
            dispatcher_config,
            DispatcherDeps {
                transport: transport.clone(),
                log_store: log_store.clone(),
                credentials: Arc::new(FileCredentialStore::new(storage.credentials_path())),
                time_source: Arc::new(SystemTimeSource::new()),
            },
        );
        let notifier = Notifier::new(dispatcher.clone(), settings.clone());

        Ok(Self {
            config,
            dispatcher,
            transport,
            log_store,
            settings,
            notifier,
            state_logger: None,
        })
    }

    /// Start background tasks and open the gateway session.
    ///
    /// A failed first connect is logged, not returned: the dispatcher keeps
    /// retrying under the reconnect policy.
    pub async fn start(&mut self) {
        log_event!(
            info,
            "Starting notification runtime",
            data_dir = %self.config.storage.data_dir.display(),
            default_region = %self.config.phone.default_region
        );

        let mut states = self.dispatcher.connection().subscribe();
        self.state_logger = Some(tokio::spawn(async move {
            while let Some(event) = states.recv().await {
                match event.state {
                    ConnectionState::QrReady => {
                        log_state_event!(info, "Scan the QR code to pair", event.state)
                    }
                    ConnectionState::Error | ConnectionState::Disconnected => log_state_event!(
                        warn,
                        "Gateway session down",
                        event.state,
                        error = event.error.as_deref().unwrap_or("none")
                    ),
                    _ => log_state_event!(info, "Gateway session state changed", event.state),
                }
            }
        }));

        self.dispatcher.start();
        if let Err(e) = self.dispatcher.connect().await {
            log_event!(warn, "Initial connect failed, retrying in background", error = %e);
        }
    }

    /// Wait until the session is `Connected`, up to `limit`.
    pub async fn wait_until_connected(&self, limit: Duration) -> bool {
        let mut states = self.dispatcher.connection().subscribe();
        if self.dispatcher.connection().is_connected() {
            return true;
        }
        tokio::time::timeout(limit, async {
            while let Some(event) = states.recv().await {
                if event.state == ConnectionState::Connected {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false)
    }

    /// Most recent attempts, newest first.
    pub async fn recent_messages(&self, limit: usize) -> Result<Vec<MessageLogEntry>, StoreError> {
        self.log_store.list(limit, 0).await
    }

    /// Drop cached settings so the next notification rereads the file.
    pub fn reload_settings(&self) {
        self.settings.invalidate();
        log_event!(debug, "Notification settings cache invalidated");
    }

    /// Tear everything down.
    pub async fn shutdown(&mut self) {
        log_event!(info, "Initiating graceful shutdown");
        self.dispatcher.shutdown().await;
        if let Some(logger) = self.state_logger.take() {
            // The state stream ends with the dispatcher; give the logger the
            // final events before dropping it.
            if tokio::time::timeout(Duration::from_secs(1), logger).await.is_err() {
                log_event!(debug, "State logger did not drain in time");
            }
        }
        log_event!(info, "Shutdown complete");
    }

    /// Active configuration.
    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Arc<MessageDispatcher> {
        &self.dispatcher
    }

    /// Settings-gated notifier.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// The transport, for pairing completion and diagnostics.
    pub fn transport(&self) -> &Arc<LoopbackTransport> {
        &self.transport
    }

    /// The settings store behind the notifier.
    pub fn settings(&self) -> Arc<dyn SettingsStore> {
        self.settings.clone()
    }
}

impl std::fmt::Debug for NotifyRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyRuntime")
            .field("dispatcher", &self.dispatcher)
            .field("data_dir", &self.config.storage.data_dir)
            .finish_non_exhaustive()
    }
}
