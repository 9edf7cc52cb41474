//! # Credential Adapters

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::settings::write_atomically;
use crate::domain::StoreError;
use crate::ports::{CredentialStore, Credentials};

/// Credentials kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<Option<Credentials>>,
}

impl InMemoryCredentialStore {
    /// Store pre-loaded with `credentials`.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: Mutex::new(Some(credentials)),
        }
    }

    /// Whether credentials are stored.
    pub fn has_credentials(&self) -> bool {
        self.credentials.lock().is_some()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, StoreError> {
        Ok(self.credentials.lock().clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        *self.credentials.lock() = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.credentials.lock() = None;
        Ok(())
    }
}

/// Credentials persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let json = serde_json::to_vec(credentials)?;
        write_atomically(&self.path, &json).await?;
        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Credentials purged");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
