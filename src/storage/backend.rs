//! The capability interface every storage backend implements.

use crate::storage::append_log::AppendLogDetails;
use crate::storage::error::StorageResult;
use crate::storage::hash_index::HashIndexDetails;
use async_trait::async_trait;
use serde::Serialize;

/// A pluggable key-value store.
///
/// All operations may touch the filesystem, so they are async and fallible.
/// Implementations serialize their own internal state; callers share a
/// backend behind an `Arc` across connections.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stable identifier, also the name used to select the backend.
    fn name(&self) -> &'static str;

    /// Stores or overwrites `key`. Returns once the write is durable.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Latest value for `key`, or `None` if it was never set or was deleted.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Logically removes `key`. Returns whether it existed beforehand.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Number of live keys.
    async fn size(&self) -> StorageResult<usize>;

    /// Forces buffered state to durable storage.
    async fn flush(&self) -> StorageResult<()>;

    /// Releases file handles and in-memory indexes. Idempotent.
    async fn close(&self) -> StorageResult<()>;

    /// Read-only projection of the backend's current shape.
    async fn inspect(&self) -> StorageResult<BackendState>;

    /// Destroys all data, leaving the backend as if freshly created.
    async fn clear(&self) -> StorageResult<()>;

    /// Whether `key` is live.
    ///
    /// Defaults to a full `get`; backends with an in-memory index answer
    /// without touching disk.
    async fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Checkpoints the write-ahead log.
    ///
    /// `Ok(None)` means the backend has no write-ahead log.
    async fn wal_checkpoint(&self) -> StorageResult<Option<WalCheckpoint>> {
        Ok(None)
    }
}

/// Introspection snapshot, recomputed on every call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendState {
    pub name: String,
    pub key_count: usize,
    pub details: BackendDetails,
}

/// Backend-specific part of a [`BackendState`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BackendDetails {
    AppendLog(AppendLogDetails),
    HashIndex(HashIndexDetails),
}

/// What a WAL checkpoint discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalCheckpoint {
    pub entries_cleared: usize,
    pub bytes_cleared: u64,
}
