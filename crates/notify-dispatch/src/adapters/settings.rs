//! # Settings Adapters
//!
//! - `InMemorySettingsStore` - process-local settings
//! - `FileSettingsStore` - JSON file, replaced atomically on save
//! - `CachedSettingsStore` - read-through cache over any store

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{NotificationSettings, StoreError};
use crate::ports::SettingsStore;

/// Settings kept in memory.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    settings: RwLock<NotificationSettings>,
}

impl InMemorySettingsStore {
    /// Store holding `settings`.
    pub fn new(settings: NotificationSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn load(&self) -> Result<NotificationSettings, StoreError> {
        Ok(self.settings.read().clone())
    }

    async fn save(&self, settings: &NotificationSettings) -> Result<(), StoreError> {
        *self.settings.write() = settings.clone();
        Ok(())
    }
}

/// Settings persisted as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    /// Store backed by `path`. A missing file reads as defaults.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Result<NotificationSettings, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(NotificationSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, settings: &NotificationSettings) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(settings)?;
        write_atomically(&self.path, &json).await?;
        debug!(path = %self.path.display(), "Notification settings saved");
        Ok(())
    }
}

/// Write `bytes` to a sibling temp file, then rename over `path`.
pub(crate) async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Read-through cache over another settings store.
///
/// Settings are read on every notification and written rarely, so the first
/// load is kept until `save` or an explicit `invalidate`.
pub struct CachedSettingsStore {
    inner: Arc<dyn SettingsStore>,
    cached: RwLock<Option<NotificationSettings>>,
    backend_loads: AtomicU64,
}

impl CachedSettingsStore {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn SettingsStore>) -> Self {
        Self {
            inner,
            cached: RwLock::new(None),
            backend_loads: AtomicU64::new(0),
        }
    }

    /// Drop the cached copy; the next load hits the backing store.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    /// Loads that reached the backing store.
    pub fn backend_loads(&self) -> u64 {
        self.backend_loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SettingsStore for CachedSettingsStore {
    async fn load(&self) -> Result<NotificationSettings, StoreError> {
        if let Some(settings) = self.cached.read().clone() {
            return Ok(settings);
        }
        self.backend_loads.fetch_add(1, Ordering::Relaxed);
        let settings = self.inner.load().await?;
        *self.cached.write() = Some(settings.clone());
        Ok(settings)
    }

    async fn save(&self, settings: &NotificationSettings) -> Result<(), StoreError> {
        self.invalidate();
        self.inner.save(settings).await?;
        *self.cached.write() = Some(settings.clone());
        Ok(())
    }
}

impl std::fmt::Debug for CachedSettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSettingsStore")
            .field("cached", &self.cached.read().is_some())
            .field("backend_loads", &self.backend_loads())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationKind;

    #[tokio::test]
    async fn test_file_store_defaults_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("conf").join("settings.json"));
        assert_eq!(store.load().await.unwrap(), NotificationSettings::default());

        let mut settings = NotificationSettings::default();
        settings.set_kind_enabled(NotificationKind::PaymentReminder, false);
        settings.set_template(NotificationKind::OrderReady, "Ready {order_id}");
        store.save(&settings).await.unwrap();

        assert_eq!(store.load().await.unwrap(), settings);
        assert!(!dir.path().join("conf").join("settings.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, b"{ nope").await.unwrap();
        let err = FileSettingsStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_cache_serves_repeat_loads() {
        let backend = Arc::new(InMemorySettingsStore::default());
        let cache = CachedSettingsStore::new(backend.clone());

        cache.load().await.unwrap();
        cache.load().await.unwrap();
        assert_eq!(cache.backend_loads(), 1);

        // A write behind the cache's back is invisible until invalidated.
        let mut disabled = NotificationSettings::default();
        disabled.enabled = false;
        backend.save(&disabled).await.unwrap();
        assert!(cache.load().await.unwrap().enabled);

        cache.invalidate();
        assert!(!cache.load().await.unwrap().enabled);
        assert_eq!(cache.backend_loads(), 2);
    }

    #[tokio::test]
    async fn test_cache_save_writes_through() {
        let backend = Arc::new(InMemorySettingsStore::default());
        let cache = CachedSettingsStore::new(backend.clone());
        cache.load().await.unwrap();

        let mut settings = NotificationSettings::default();
        settings.set_kind_enabled(NotificationKind::OrderCreated, false);
        cache.save(&settings).await.unwrap();

        assert_eq!(backend.load().await.unwrap(), settings);
        assert_eq!(cache.load().await.unwrap(), settings);
        assert_eq!(cache.backend_loads(), 1);
    }
}
