//! # Message Log Adapters
//!
//! - `InMemoryMessageLogStore` - process-local log for tests and demos
//! - `JsonlMessageLogStore` - append-only JSON Lines file

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::domain::{MessageLogEntry, MessageStatus, RecipientAddress, StoreError};
use crate::ports::MessageLogStore;

/// Newest-first page over entries stored oldest-first.
fn page(entries: &[MessageLogEntry], limit: usize, offset: usize) -> Vec<MessageLogEntry> {
    entries.iter().rev().skip(offset).take(limit).cloned().collect()
}

// =============================================================================
// In-memory
// =============================================================================

/// Message log kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryMessageLogStore {
    entries: RwLock<Vec<MessageLogEntry>>,
    fail_appends: AtomicBool,
}

impl InMemoryMessageLogStore {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all entries, oldest first.
    pub fn entries(&self) -> Vec<MessageLogEntry> {
        self.entries.read().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Make subsequent appends fail (or succeed again).
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageLogStore for InMemoryMessageLogStore {
    async fn append(&self, entry: MessageLogEntry) -> Result<(), StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("message log is read-only".into()));
        }
        self.entries.write().push(entry);
        Ok(())
    }

    async fn list_by_recipient(
        &self,
        recipient: &RecipientAddress,
    ) -> Result<Vec<MessageLogEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| &e.recipient == recipient)
            .cloned()
            .collect())
    }

    async fn list_by_status(
        &self,
        status: MessageStatus,
    ) -> Result<Vec<MessageLogEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.status == status)
            .cloned()
            .collect())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MessageLogEntry>, StoreError> {
        Ok(page(&self.entries.read(), limit, offset))
    }
}

// =============================================================================
// JSON Lines file
// =============================================================================

/// Message log persisted as one JSON object per line.
///
/// Appends are serialized through an async mutex so concurrent writers never
/// interleave partial lines. Lines that fail to parse on read are skipped
/// with a warning.
#[derive(Debug)]
pub struct JsonlMessageLogStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlMessageLogStore {
    /// Log stored at `path`; the file and its parent directory are created on
    /// first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<MessageLogEntry>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed message log line"
                ),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl MessageLogStore for JsonlMessageLogStore {
    async fn append(&self, entry: MessageLogEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(entry_id = %entry.id, "Message log entry appended");
        Ok(())
    }

    async fn list_by_recipient(
        &self,
        recipient: &RecipientAddress,
    ) -> Result<Vec<MessageLogEntry>, StoreError> {
        let mut entries = self.read_all().await?;
        entries.retain(|e| &e.recipient == recipient);
        Ok(entries)
    }

    async fn list_by_status(
        &self,
        status: MessageStatus,
    ) -> Result<Vec<MessageLogEntry>, StoreError> {
        let mut entries = self.read_all().await?;
        entries.retain(|e| e.status == status);
        Ok(entries)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<MessageLogEntry>, StoreError> {
        Ok(page(&self.read_all().await?, limit, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NotificationKind, PhoneValidator, Timestamp};

    fn address(raw: &str) -> RecipientAddress {
        PhoneValidator::default()
            .validate(raw)
            .into_address()
            .unwrap()
    }

    fn sample(n: u64) -> MessageLogEntry {
        let at = Timestamp::from_millis(1_700_000_000_000 + n);
        if n % 2 == 0 {
            MessageLogEntry::sent(
                address("081234567890"),
                NotificationKind::OrderReady,
                format!("m{n}"),
                format!("id{n}"),
                at,
            )
        } else {
            MessageLogEntry::failed(
                address("081298765432"),
                NotificationKind::Custom,
                format!("m{n}"),
                "boom",
                at,
            )
        }
    }

    #[tokio::test]
    async fn test_in_memory_queries() {
        let store = InMemoryMessageLogStore::new();
        for n in 0..5 {
            store.append(sample(n)).await.unwrap();
        }

        let failed = store.list_by_status(MessageStatus::Failed).await.unwrap();
        assert_eq!(failed.len(), 2);

        let to_first = store.list_by_recipient(&address("0812-3456-7890")).await.unwrap();
        assert_eq!(to_first.len(), 3);

        let page = store.list(2, 1).await.unwrap();
        let contents: Vec<_> = page.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m2"]);
    }

    #[tokio::test]
    async fn test_in_memory_append_failure() {
        let store = InMemoryMessageLogStore::new();
        store.set_fail_appends(true);
        assert!(store.append(sample(0)).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_round_trip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlMessageLogStore::new(dir.path().join("logs").join("messages.jsonl"));
        assert!(store.list(10, 0).await.unwrap().is_empty());

        for n in 0..4 {
            store.append(sample(n)).await.unwrap();
        }

        let all = store.list(10, 0).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].content, "m3");
        assert_eq!(store.list_by_status(MessageStatus::Sent).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_jsonl_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.jsonl");
        let store = JsonlMessageLogStore::new(&path);
        store.append(sample(0)).await.unwrap();
        tokio::fs::write(
            &path,
            format!("{}not json\n\n", tokio::fs::read_to_string(&path).await.unwrap()),
        )
        .await
        .unwrap();
        store.append(sample(2)).await.unwrap();

        assert_eq!(store.list(10, 0).await.unwrap().len(), 2);
    }
}
