//! Hash Index Backend (Bitcask model + WAL)
//!
//! Keeps an in-memory `HashMap<key, IndexEntry>` pointing at the byte
//! position of each key's latest record in the shared main log.
//!
//! ## Write Path
//!
//! 1. Frame the operation into the WAL and sync it
//! 2. Append the record to the main log and sync it
//! 3. Update the in-memory index
//!
//! A crash between steps 1 and 2 leaves the operation only in the WAL; the
//! next `open` replays it into the main log.
//!
//! - SET: O(1) write
//! - GET: index lookup plus a single positioned read → O(1)
//! - DEL: O(1), and only when the key is live
//!
//! Every key must fit in memory, and the log is never compacted.

use crate::storage::append_log::LOG_FILE_NAME;
use crate::storage::backend::{BackendDetails, BackendState, StorageBackend, WalCheckpoint};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::file_io;
use crate::storage::record::{decode_record, encode_record, load_log, LogRecord, RecordKind};
use crate::storage::wal::{WalEntry, WalState, WriteAheadLog};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const NAME: &str = "hash-index";

/// File name of the write-ahead log inside the data directory.
pub const WAL_FILE_NAME: &str = "hash-index.wal";

/// How many index entries `inspect` lists.
const INSPECT_INDEX_ENTRIES: usize = 50;

/// Where a key's latest SET record lives in the main log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IndexEntry {
    offset: u64,
    record_size: u64,
    value_len: u32,
}

/// Open files plus the index built over them.
struct Inner {
    log: File,
    wal: WriteAheadLog,
    index: HashMap<String, IndexEntry>,
    /// Offset the next record will be written at
    end_offset: u64,
    total_records: usize,
}

impl Inner {
    fn apply(&mut self, record: &LogRecord) {
        match record.kind {
            RecordKind::Set => {
                self.index.insert(
                    record.key.clone(),
                    IndexEntry {
                        offset: record.offset,
                        record_size: record.size,
                        value_len: record.value_len,
                    },
                );
            }
            RecordKind::Delete => {
                self.index.remove(&record.key);
            }
        }
        self.end_offset = record.offset + record.size;
        self.total_records += 1;
    }

    /// Appends to the main log and indexes the new record.
    async fn append_to_log(&mut self, kind: RecordKind, key: &str, value: &str) -> StorageResult<()> {
        let encoded = encode_record(kind, key, value)?;
        file_io::append_at_end(&mut self.log, self.end_offset, &encoded).await?;

        let record = LogRecord {
            kind,
            key: key.to_string(),
            value: String::new(),
            offset: self.end_offset,
            size: encoded.len() as u64,
            value_len: value.len() as u32,
        };
        self.apply(&record);
        Ok(())
    }

    /// WAL first, then the main log.
    async fn write(&mut self, kind: RecordKind, key: &str, value: &str) -> StorageResult<()> {
        self.wal.append(kind, key, value).await?;
        self.append_to_log(kind, key, value).await
    }
}

/// Hash-indexed log backend.
pub struct HashIndex {
    path: PathBuf,
    /// `None` once closed
    inner: Mutex<Option<Inner>>,
    /// Valid WAL entries found when the backend was opened
    last_wal_recovery: usize,
}

/// `inspect` details for the hash index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashIndexDetails {
    pub file_path: String,
    pub file_size_bytes: u64,
    pub log_offset: u64,
    pub index_size: usize,
    pub index_entries: Vec<IndexEntryView>,
    pub total_records_on_disk: usize,
    pub wal: WalState,
    pub last_wal_recovery_count: usize,
}

/// One index entry as shown by `inspect`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntryView {
    pub key: String,
    pub offset: u64,
    pub value_length: u32,
}

/// How many leading WAL entries are already the trailing records of the log.
///
/// WAL entries are appended to the log in the same order, so everything up
/// to the crash point shows up as a suffix of the log.
fn already_logged(records: &[LogRecord], entries: &[WalEntry]) -> usize {
    let same = |r: &LogRecord, e: &WalEntry| r.kind == e.kind && r.key == e.key && r.value == e.value;

    (0..=entries.len().min(records.len()))
        .rev()
        .find(|&k| {
            let tail = &records[records.len() - k..];
            tail.iter().zip(&entries[..k]).all(|(r, e)| same(r, e))
        })
        .unwrap_or(0)
}

impl HashIndex {
    /// Opens the backend in `data_dir`.
    ///
    /// Rebuilds the index from the main log, replays WAL entries the log is
    /// missing, then checkpoints the WAL if it held anything.
    pub async fn open(data_dir: &Path) -> StorageResult<Self> {
        let path = data_dir.join(LOG_FILE_NAME);
        let mut log = file_io::open_append(&path).await?;
        let records = load_log(&mut log, NAME).await?;
        let mut wal = WriteAheadLog::open(&data_dir.join(WAL_FILE_NAME)).await?;
        let recovery = wal.recover().await?;

        let mut inner = Inner {
            log,
            wal,
            index: HashMap::new(),
            end_offset: 0,
            total_records: 0,
        };
        for record in &records {
            inner.apply(record);
        }

        let skip = already_logged(&records, &recovery.entries);
        let missing = &recovery.entries[skip..];
        if !missing.is_empty() {
            info!(entries = missing.len(), "Replaying WAL entries into the main log");
            for entry in missing {
                inner.append_to_log(entry.kind, &entry.key, &entry.value).await?;
            }
        }
        if recovery.corrupted_bytes > 0 {
            warn!(
                corrupted_bytes = recovery.corrupted_bytes,
                "Skipped damaged WAL tail (crash damage)"
            );
        }
        if !recovery.entries.is_empty() || recovery.corrupted_bytes > 0 {
            inner.wal.checkpoint().await?;
        }

        debug!(
            path = %path.display(),
            keys = inner.index.len(),
            records = inner.total_records,
            "Opened hash index"
        );

        Ok(Self {
            path,
            inner: Mutex::new(Some(inner)),
            last_wal_recovery: recovery.entries.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_inner(inner: &mut Option<Inner>) -> StorageResult<&mut Inner> {
    inner.as_mut().ok_or(StorageError::Closed(NAME))
}

#[async_trait]
impl StorageBackend for HashIndex {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.inner.lock().await;
        open_inner(&mut guard)?
            .write(RecordKind::Set, key, value)
            .await
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut guard = self.inner.lock().await;
        let inner = open_inner(&mut guard)?;
        let Some(entry) = inner.index.get(key).copied() else {
            return Ok(None);
        };

        let buf = file_io::read_at(&mut inner.log, entry.offset, entry.record_size as usize).await?;
        match decode_record(&buf, 0) {
            Some(record) if record.kind == RecordKind::Set && record.key == key => {
                Ok(Some(record.value))
            }
            _ => Err(StorageError::Corrupted {
                offset: entry.offset,
                reason: format!("index entry for '{}' does not point at its record", key),
            }),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut guard = self.inner.lock().await;
        let inner = open_inner(&mut guard)?;
        if !inner.index.contains_key(key) {
            return Ok(false);
        }
        inner.write(RecordKind::Delete, key, "").await?;
        Ok(true)
    }

    async fn size(&self) -> StorageResult<usize> {
        let mut guard = self.inner.lock().await;
        Ok(open_inner(&mut guard)?.index.len())
    }

    async fn contains(&self, key: &str) -> StorageResult<bool> {
        let mut guard = self.inner.lock().await;
        Ok(open_inner(&mut guard)?.index.contains_key(key))
    }

    async fn flush(&self) -> StorageResult<()> {
        let mut guard = self.inner.lock().await;
        let inner = open_inner(&mut guard)?;
        inner.log.sync_all().await?;
        inner.wal.sync().await
    }

    async fn close(&self) -> StorageResult<()> {
        let mut guard = self.inner.lock().await;
        if let Some(mut inner) = guard.take() {
            // Every WAL entry is already in the main log.
            inner.wal.checkpoint().await?;
            inner.log.sync_all().await?;
            debug!(path = %self.path.display(), "Closed hash index");
        }
        Ok(())
    }

    async fn inspect(&self) -> StorageResult<BackendState> {
        let mut guard = self.inner.lock().await;
        let inner = open_inner(&mut guard)?;

        let mut index_entries: Vec<_> = inner
            .index
            .iter()
            .map(|(key, entry)| IndexEntryView {
                key: key.clone(),
                offset: entry.offset,
                value_length: entry.value_len,
            })
            .collect();
        index_entries.sort_by(|a, b| a.key.cmp(&b.key));
        index_entries.truncate(INSPECT_INDEX_ENTRIES);

        Ok(BackendState {
            name: NAME.to_string(),
            key_count: inner.index.len(),
            details: BackendDetails::HashIndex(HashIndexDetails {
                file_path: self.path.display().to_string(),
                file_size_bytes: file_io::file_len(&inner.log).await?,
                log_offset: inner.end_offset,
                index_size: inner.index.len(),
                index_entries,
                total_records_on_disk: inner.total_records,
                wal: inner.wal.inspect().await?,
                last_wal_recovery_count: self.last_wal_recovery,
            }),
        })
    }

    async fn clear(&self) -> StorageResult<()> {
        let mut guard = self.inner.lock().await;
        let inner = open_inner(&mut guard)?;
        file_io::truncate(&mut inner.log).await?;
        inner.wal.checkpoint().await?;
        inner.index.clear();
        inner.end_offset = 0;
        inner.total_records = 0;
        Ok(())
    }

    async fn wal_checkpoint(&self) -> StorageResult<Option<WalCheckpoint>> {
        let mut guard = self.inner.lock().await;
        let (entries_cleared, bytes_cleared) = open_inner(&mut guard)?.wal.checkpoint().await?;
        Ok(Some(WalCheckpoint {
            entries_cleared,
            bytes_cleared,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::wal::encode_frame;
    use tempfile::TempDir;

    async fn open_index() -> (TempDir, HashIndex) {
        let dir = TempDir::new().unwrap();
        let index = HashIndex::open(dir.path()).await.unwrap();
        (dir, index)
    }

    fn details(state: BackendState) -> HashIndexDetails {
        match state.details {
            BackendDetails::HashIndex(details) => details,
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (_dir, index) = open_index().await;
        index.set("name", "logkv").await.unwrap();
        index.set("name", "log engine").await.unwrap();

        assert_eq!(index.get("name").await.unwrap(), Some("log engine".to_string()));
        assert!(index.contains("name").await.unwrap());
        assert_eq!(index.size().await.unwrap(), 1);

        assert!(index.delete("name").await.unwrap());
        assert!(!index.delete("name").await.unwrap());
        assert_eq!(index.get("name").await.unwrap(), None);
        assert!(!index.contains("name").await.unwrap());
        assert_eq!(index.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_value() {
        let (_dir, index) = open_index().await;
        index.set("empty", "").await.unwrap();
        assert_eq!(index.get("empty").await.unwrap(), Some(String::new()));
    }

    #[tokio::test]
    async fn test_index_rebuilt_on_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let index = HashIndex::open(dir.path()).await.unwrap();
            index.set("a", "1").await.unwrap();
            index.set("b", "2").await.unwrap();
            index.set("a", "3").await.unwrap();
            index.delete("b").await.unwrap();
            index.close().await.unwrap();
        }

        let index = HashIndex::open(dir.path()).await.unwrap();
        assert_eq!(index.get("a").await.unwrap(), Some("3".to_string()));
        assert_eq!(index.get("b").await.unwrap(), None);
        assert_eq!(index.size().await.unwrap(), 1);

        let details = details(index.inspect().await.unwrap());
        assert_eq!(details.total_records_on_disk, 4);
        assert_eq!(details.last_wal_recovery_count, 0);
    }

    #[tokio::test]
    async fn test_wal_replay_after_crash() {
        let dir = TempDir::new().unwrap();
        {
            let index = HashIndex::open(dir.path()).await.unwrap();
            index.set("kept", "1").await.unwrap();
            index.close().await.unwrap();
        }

        // Simulate a crash after the WAL write but before the main log write.
        let mut frames = encode_frame(RecordKind::Set, "lost", "found").unwrap();
        frames.extend_from_slice(&encode_frame(RecordKind::Delete, "kept", "").unwrap());
        std::fs::write(dir.path().join(WAL_FILE_NAME), &frames).unwrap();

        let index = HashIndex::open(dir.path()).await.unwrap();
        assert_eq!(index.get("lost").await.unwrap(), Some("found".to_string()));
        assert_eq!(index.get("kept").await.unwrap(), None);

        let details = details(index.inspect().await.unwrap());
        assert_eq!(details.last_wal_recovery_count, 2);
        assert_eq!(details.wal.entry_count, 0);
        assert_eq!(details.total_records_on_disk, 3);
    }

    #[tokio::test]
    async fn test_unclean_shutdown_does_not_duplicate_records() {
        let dir = TempDir::new().unwrap();
        {
            let index = HashIndex::open(dir.path()).await.unwrap();
            index.set("a", "1").await.unwrap();
            index.set("b", "2").await.unwrap();
            // Dropped without close: the WAL still holds both entries.
        }

        let index = HashIndex::open(dir.path()).await.unwrap();
        assert_eq!(index.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(index.get("b").await.unwrap(), Some("2".to_string()));

        let details = details(index.inspect().await.unwrap());
        assert_eq!(details.last_wal_recovery_count, 2);
        assert_eq!(details.total_records_on_disk, 2);
        assert_eq!(details.wal.entry_count, 0);
    }

    #[tokio::test]
    async fn test_corrupted_wal_tail_is_skipped() {
        let dir = TempDir::new().unwrap();
        let mut frames = encode_frame(RecordKind::Set, "good", "1").unwrap();
        let bad = encode_frame(RecordKind::Set, "bad", "2").unwrap();
        frames.extend_from_slice(&bad[..bad.len() - 1]);
        std::fs::write(dir.path().join(WAL_FILE_NAME), &frames).unwrap();

        let index = HashIndex::open(dir.path()).await.unwrap();
        assert_eq!(index.get("good").await.unwrap(), Some("1".to_string()));
        assert_eq!(index.get("bad").await.unwrap(), None);

        let details = details(index.inspect().await.unwrap());
        assert_eq!(details.wal.file_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_wal_replays_records_over_ten_megabytes() {
        let dir = TempDir::new().unwrap();
        let big = "x".repeat(11 * 1024 * 1024);
        let mut frames = encode_frame(RecordKind::Set, "big", &big).unwrap();
        frames.extend_from_slice(&encode_frame(RecordKind::Set, "small", "v").unwrap());
        std::fs::write(dir.path().join(WAL_FILE_NAME), &frames).unwrap();

        let index = HashIndex::open(dir.path()).await.unwrap();
        assert_eq!(index.get("big").await.unwrap(), Some(big));
        assert_eq!(index.get("small").await.unwrap(), Some("v".to_string()));

        let details = details(index.inspect().await.unwrap());
        assert_eq!(details.last_wal_recovery_count, 2);
        assert_eq!(details.wal.file_size_bytes, 0);
    }

    #[tokio::test]
    async fn test_partial_log_write_is_not_left_behind() {
        let dir = TempDir::new().unwrap();
        let index = HashIndex::open(dir.path()).await.unwrap();
        index.set("a", "1").await.unwrap();

        // Bytes of a record whose write failed halfway
        let mut log = file_io::open_append(&dir.path().join(LOG_FILE_NAME)).await.unwrap();
        file_io::append_durable(&mut log, &[0x01, 0, 0, 0, 9, b'h'])
            .await
            .unwrap();

        index.set("b", "2").await.unwrap();
        assert_eq!(index.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(index.get("b").await.unwrap(), Some("2".to_string()));
        index.close().await.unwrap();

        let index = HashIndex::open(dir.path()).await.unwrap();
        assert_eq!(index.get("b").await.unwrap(), Some("2".to_string()));
        let details = details(index.inspect().await.unwrap());
        assert_eq!(details.total_records_on_disk, 2);
        assert_eq!(details.log_offset, details.file_size_bytes);
    }

    #[tokio::test]
    async fn test_wal_checkpoint() {
        let (_dir, index) = open_index().await;
        index.set("a", "1").await.unwrap();
        index.set("b", "2").await.unwrap();
        index.delete("a").await.unwrap();

        let checkpoint = index.wal_checkpoint().await.unwrap().unwrap();
        assert_eq!(checkpoint.entries_cleared, 3);
        assert!(checkpoint.bytes_cleared > 0);

        let again = index.wal_checkpoint().await.unwrap().unwrap();
        assert_eq!(again.entries_cleared, 0);
        assert_eq!(index.get("b").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_inspect() {
        let (_dir, index) = open_index().await;
        for i in 0..60 {
            index.set(&format!("key{:02}", i), "value").await.unwrap();
        }

        let state = index.inspect().await.unwrap();
        assert_eq!(state.name, NAME);
        assert_eq!(state.key_count, 60);

        let details = details(state);
        assert_eq!(details.index_size, 60);
        assert_eq!(details.index_entries.len(), INSPECT_INDEX_ENTRIES);
        assert_eq!(details.index_entries[0].key, "key00");
        assert_eq!(details.index_entries[0].offset, 0);
        assert_eq!(details.index_entries[0].value_length, 5);
        assert_eq!(details.log_offset, details.file_size_bytes);
        assert_eq!(details.wal.entry_count, 60);
    }

    #[tokio::test]
    async fn test_clear() {
        let (_dir, index) = open_index().await;
        index.set("a", "1").await.unwrap();
        index.clear().await.unwrap();

        assert_eq!(index.size().await.unwrap(), 0);
        assert_eq!(index.get("a").await.unwrap(), None);

        index.set("b", "2").await.unwrap();
        assert_eq!(index.get("b").await.unwrap(), Some("2".to_string()));
        let details = details(index.inspect().await.unwrap());
        assert_eq!(details.index_entries[0].offset, 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_rejects_ops() {
        let (_dir, index) = open_index().await;
        index.close().await.unwrap();
        index.close().await.unwrap();
        assert!(matches!(index.get("k").await, Err(StorageError::Closed(NAME))));
    }

    #[test]
    fn test_already_logged() {
        let record = |key: &str, offset| LogRecord {
            kind: RecordKind::Set,
            key: key.to_string(),
            value: "v".to_string(),
            offset,
            size: 11,
            value_len: 1,
        };
        let entry = |key: &str| WalEntry {
            kind: RecordKind::Set,
            key: key.to_string(),
            value: "v".to_string(),
            offset: 0,
            size: 19,
        };

        let records = vec![record("a", 0), record("b", 11)];
        assert_eq!(already_logged(&records, &[entry("b")]), 1);
        assert_eq!(already_logged(&records, &[entry("b"), entry("c")]), 1);
        assert_eq!(already_logged(&records, &[entry("c")]), 0);
        assert_eq!(already_logged(&records, &[entry("a"), entry("b")]), 2);
        assert_eq!(already_logged(&[], &[entry("a")]), 0);
    }
}
