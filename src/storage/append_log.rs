//! Append-Only Log Backend
//!
//! The simplest possible storage engine:
//! - SET: append a record to the end of the file → O(1) write
//! - GET: scan every record, newest first, until the key shows up → O(n) read
//! - DEL: append a tombstone record → O(1) write (after an O(n) existence check)
//!
//! `n` counts every record ever written, superseded versions included. This
//! backend is the baseline the hash index is measured against.

use crate::storage::backend::{BackendDetails, BackendState, StorageBackend};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::file_io;
use crate::storage::record::{encode_record, load_log, LogRecord, RecordIter, RecordKind};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File name of the main log inside the data directory.
pub const LOG_FILE_NAME: &str = "engine.log";

/// How many trailing records `inspect` reports.
const RECENT_RECORDS: usize = 30;

pub const NAME: &str = "append-log";

/// Append-only log backend.
pub struct AppendLog {
    path: PathBuf,
    /// `None` once closed
    file: Mutex<Option<LogFile>>,
}

/// The open log and the end of its last complete record.
struct LogFile {
    file: File,
    len: u64,
}

impl LogFile {
    async fn append(&mut self, record: &[u8]) -> StorageResult<()> {
        file_io::append_at_end(&mut self.file, self.len, record).await?;
        self.len += record.len() as u64;
        Ok(())
    }
}

/// `inspect` details for the append-only log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendLogDetails {
    pub file_path: String,
    pub file_size_bytes: u64,
    pub total_records: usize,
    pub live_keys: usize,
    pub recent_records: Vec<RecordView>,
}

/// One record as shown by `inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub key: String,
    pub value: Option<String>,
    pub offset: u64,
    pub size: u64,
}

impl From<&LogRecord> for RecordView {
    fn from(record: &LogRecord) -> Self {
        Self {
            kind: record.kind,
            key: record.key.clone(),
            value: (!record.is_tombstone()).then(|| record.value.clone()),
            offset: record.offset,
            size: record.size,
        }
    }
}

impl AppendLog {
    /// Opens the log in `data_dir`, creating the directory and file if needed.
    pub async fn open(data_dir: &Path) -> StorageResult<Self> {
        let path = data_dir.join(LOG_FILE_NAME);
        let mut file = file_io::open_append(&path).await?;
        let records = load_log(&mut file, NAME).await?;
        let len = file_io::file_len(&file).await?;
        debug!(path = %path.display(), records = records.len(), len, "Opened append log");

        Ok(Self {
            path,
            file: Mutex::new(Some(LogFile { file, len })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes every record in write order.
    async fn read_records(file: &mut File) -> StorageResult<Vec<LogRecord>> {
        let buf = file_io::read_all(file).await?;
        let mut iter = RecordIter::new(&buf);
        let records: Vec<_> = iter.by_ref().collect();

        if let Some(offset) = iter.corrupt_offset() {
            warn!(backend = NAME, offset, "Corrupted record in log, ignoring the rest");
        }
        Ok(records)
    }

    /// Newest record for `key`, if any.
    fn latest<'a>(records: &'a [LogRecord], key: &str) -> Option<&'a LogRecord> {
        records.iter().rev().find(|r| r.key == key)
    }

    fn live_keys(records: &[LogRecord]) -> HashSet<&str> {
        let mut live = HashSet::new();
        for record in records {
            match record.kind {
                RecordKind::Set => live.insert(record.key.as_str()),
                RecordKind::Delete => live.remove(record.key.as_str()),
            };
        }
        live
    }
}

fn open_file(file: &mut Option<LogFile>) -> StorageResult<&mut LogFile> {
    file.as_mut().ok_or(StorageError::Closed(NAME))
}

#[async_trait]
impl StorageBackend for AppendLog {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let record = encode_record(RecordKind::Set, key, value)?;
        let mut guard = self.file.lock().await;
        open_file(&mut guard)?.append(&record).await
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut guard = self.file.lock().await;
        let records = Self::read_records(&mut open_file(&mut guard)?.file).await?;

        Ok(Self::latest(&records, key)
            .filter(|r| !r.is_tombstone())
            .map(|r| r.value.clone()))
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut guard = self.file.lock().await;
        let log = open_file(&mut guard)?;
        let records = Self::read_records(&mut log.file).await?;

        let exists = Self::latest(&records, key).is_some_and(|r| !r.is_tombstone());
        if !exists {
            return Ok(false);
        }

        let tombstone = encode_record(RecordKind::Delete, key, "")?;
        log.append(&tombstone).await?;
        Ok(true)
    }

    async fn size(&self) -> StorageResult<usize> {
        let mut guard = self.file.lock().await;
        let records = Self::read_records(&mut open_file(&mut guard)?.file).await?;
        Ok(Self::live_keys(&records).len())
    }

    async fn flush(&self) -> StorageResult<()> {
        // Every append is already synced; this only covers metadata.
        let mut guard = self.file.lock().await;
        open_file(&mut guard)?.file.sync_all().await?;
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        let mut guard = self.file.lock().await;
        if let Some(log) = guard.take() {
            log.file.sync_all().await?;
            debug!(path = %self.path.display(), "Closed append log");
        }
        Ok(())
    }

    async fn inspect(&self) -> StorageResult<BackendState> {
        let mut guard = self.file.lock().await;
        let file = &mut open_file(&mut guard)?.file;
        let records = Self::read_records(file).await?;
        let live = Self::live_keys(&records).len();
        let skip = records.len().saturating_sub(RECENT_RECORDS);

        Ok(BackendState {
            name: NAME.to_string(),
            key_count: live,
            details: BackendDetails::AppendLog(AppendLogDetails {
                file_path: self.path.display().to_string(),
                file_size_bytes: file_io::file_len(file).await?,
                total_records: records.len(),
                live_keys: live,
                recent_records: records[skip..].iter().map(RecordView::from).collect(),
            }),
        })
    }

    async fn clear(&self) -> StorageResult<()> {
        let mut guard = self.file.lock().await;
        let log = open_file(&mut guard)?;
        file_io::truncate(&mut log.file).await?;
        log.len = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_log() -> (TempDir, AppendLog) {
        let dir = TempDir::new().unwrap();
        let log = AppendLog::open(dir.path()).await.unwrap();
        (dir, log)
    }

    #[tokio::test]
    async fn test_set_get() {
        let (_dir, log) = open_log().await;
        log.set("name", "logkv").await.unwrap();
        assert_eq!(log.get("name").await.unwrap(), Some("logkv".to_string()));
        assert_eq!(log.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_latest_write_wins() {
        let (_dir, log) = open_log().await;
        log.set("k", "1").await.unwrap();
        log.set("k", "2").await.unwrap();
        log.set("k", "3").await.unwrap();
        assert_eq!(log.get("k").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, log) = open_log().await;
        log.set("k", "v").await.unwrap();

        assert!(log.delete("k").await.unwrap());
        assert_eq!(log.get("k").await.unwrap(), None);
        assert!(!log.delete("k").await.unwrap());
        assert!(!log.delete("never").await.unwrap());
        assert_eq!(log.get("never").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_of_missing_key_appends_nothing() {
        let (_dir, log) = open_log().await;
        log.set("a", "1").await.unwrap();
        log.delete("b").await.unwrap();

        let state = log.inspect().await.unwrap();
        match state.details {
            BackendDetails::AppendLog(details) => assert_eq!(details.total_records, 1),
            other => panic!("unexpected details: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_size_deduplicates_by_key() {
        let (_dir, log) = open_log().await;
        log.set("a", "1").await.unwrap();
        log.set("a", "2").await.unwrap();
        log.set("a", "3").await.unwrap();
        log.delete("a").await.unwrap();
        log.set("b", "1").await.unwrap();
        log.set("b", "2").await.unwrap();

        assert_eq!(log.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_after_delete_revives_key() {
        let (_dir, log) = open_log().await;
        log.set("k", "old").await.unwrap();
        log.delete("k").await.unwrap();
        log.set("k", "new").await.unwrap();

        assert_eq!(log.get("k").await.unwrap(), Some("new".to_string()));
        assert_eq!(log.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let log = AppendLog::open(dir.path()).await.unwrap();
            log.set("k", "v").await.unwrap();
            log.set("gone", "x").await.unwrap();
            log.delete("gone").await.unwrap();
            log.close().await.unwrap();
        }

        let log = AppendLog::open(dir.path()).await.unwrap();
        assert_eq!(log.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(log.get("gone").await.unwrap(), None);
        assert_eq!(log.size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let (_dir, log) = open_log().await;
        log.set("a", "1").await.unwrap();
        log.set("b", "2").await.unwrap();
        log.clear().await.unwrap();

        assert_eq!(log.size().await.unwrap(), 0);
        assert_eq!(log.get("a").await.unwrap(), None);

        log.set("c", "3").await.unwrap();
        assert_eq!(log.get("c").await.unwrap(), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_rejects_ops() {
        let (_dir, log) = open_log().await;
        log.close().await.unwrap();
        log.close().await.unwrap();

        assert!(matches!(
            log.set("k", "v").await,
            Err(StorageError::Closed(NAME))
        ));
    }

    #[tokio::test]
    async fn test_inspect_reports_recent_records() {
        let (_dir, log) = open_log().await;
        for i in 0..40 {
            log.set(&format!("key{}", i), "v").await.unwrap();
        }
        log.delete("key39").await.unwrap();

        let state = log.inspect().await.unwrap();
        assert_eq!(state.name, NAME);
        assert_eq!(state.key_count, 39);

        let BackendDetails::AppendLog(details) = state.details else {
            panic!("wrong details variant");
        };
        assert_eq!(details.total_records, 41);
        assert_eq!(details.recent_records.len(), RECENT_RECORDS);
        let last = details.recent_records.last().unwrap();
        assert_eq!(last.kind, RecordKind::Delete);
        assert_eq!(last.value, None);
        assert!(details.file_size_bytes > 0);
    }

    #[tokio::test]
    async fn test_partial_write_is_not_left_behind() {
        let (dir, log) = open_log().await;
        log.set("a", "1").await.unwrap();

        // Bytes of a record whose write failed halfway
        let mut file = file_io::open_append(&dir.path().join(LOG_FILE_NAME))
            .await
            .unwrap();
        file_io::append_durable(&mut file, &[0x01, 0, 0, 0, 9, b'h'])
            .await
            .unwrap();

        log.set("b", "2").await.unwrap();
        assert_eq!(log.get("a").await.unwrap(), Some("1".to_string()));
        assert_eq!(log.get("b").await.unwrap(), Some("2".to_string()));
        assert_eq!(log.size().await.unwrap(), 2);
        log.close().await.unwrap();

        let log = AppendLog::open(dir.path()).await.unwrap();
        assert_eq!(log.get("b").await.unwrap(), Some("2".to_string()));
        let BackendDetails::AppendLog(details) = log.inspect().await.unwrap().details else {
            panic!("wrong details variant");
        };
        assert_eq!(details.total_records, 2);
    }

    #[tokio::test]
    async fn test_torn_tail_is_ignored() {
        let dir = TempDir::new().unwrap();
        {
            let log = AppendLog::open(dir.path()).await.unwrap();
            log.set("k", "v").await.unwrap();
            log.close().await.unwrap();
        }
        let path = dir.path().join(LOG_FILE_NAME);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(&[0x01, 0, 0]);
        std::fs::write(&path, bytes).unwrap();

        let log = AppendLog::open(dir.path()).await.unwrap();
        assert_eq!(log.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(log.size().await.unwrap(), 1);

        // The torn bytes are gone, so new appends stay reachable.
        log.set("after", "crash").await.unwrap();
        assert_eq!(log.get("after").await.unwrap(), Some("crash".to_string()));
    }
}
