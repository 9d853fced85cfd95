//! On-disk record format shared by the log-based backends.
//!
//! ```text
//! ┌──────────┬───────────┬──────────────┬───────────┬────────────────┐
//! │ type (1B)│ keyLen(4B)│ key (keyLen) │ valLen(4B)│ value (valLen) │
//! └──────────┴───────────┴──────────────┴───────────┴────────────────┘
//! ```
//!
//! Lengths are big-endian u32. `type` is `0x01` for a SET and `0x02` for a
//! DELETE tombstone, whose value is always empty.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::file_io;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio::fs::File;
use tracing::warn;

pub const RECORD_TYPE_SET: u8 = 0x01;
pub const RECORD_TYPE_DELETE: u8 = 0x02;

/// type + keyLen + valLen
pub const RECORD_OVERHEAD: usize = 1 + 4 + 4;

/// Whether a record writes a value or deletes the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordKind {
    Set,
    #[serde(rename = "DEL")]
    Delete,
}

impl RecordKind {
    fn to_byte(self) -> u8 {
        match self {
            RecordKind::Set => RECORD_TYPE_SET,
            RecordKind::Delete => RECORD_TYPE_DELETE,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            RECORD_TYPE_SET => Some(RecordKind::Set),
            RECORD_TYPE_DELETE => Some(RecordKind::Delete),
            _ => None,
        }
    }
}

/// A decoded record together with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub kind: RecordKind,
    pub key: String,
    pub value: String,
    /// Byte offset where the record starts
    pub offset: u64,
    /// Total encoded size in bytes
    pub size: u64,
    /// Encoded value length in bytes
    pub value_len: u32,
}

impl LogRecord {
    pub fn is_tombstone(&self) -> bool {
        self.kind == RecordKind::Delete
    }

    /// Byte offset of the value inside the log.
    pub fn value_offset(&self) -> u64 {
        self.offset + self.size - u64::from(self.value_len)
    }
}

/// Encodes one record.
pub fn encode_record(kind: RecordKind, key: &str, value: &str) -> StorageResult<Bytes> {
    let key_len = length_prefix("key", key.len())?;
    let value_len = length_prefix("value", value.len())?;

    let mut buf = BytesMut::with_capacity(RECORD_OVERHEAD + key.len() + value.len());
    buf.put_u8(kind.to_byte());
    buf.put_u32(key_len);
    buf.put_slice(key.as_bytes());
    buf.put_u32(value_len);
    buf.put_slice(value.as_bytes());
    Ok(buf.freeze())
}

fn length_prefix(what: &'static str, len: usize) -> StorageResult<u32> {
    u32::try_from(len).map_err(|_| StorageError::TooLarge { what, len })
}

/// Decodes the record starting at `offset`.
///
/// Returns `None` when the bytes there are truncated or carry an unknown
/// type, which is how a torn write at the tail of the log looks.
pub fn decode_record(buf: &[u8], offset: usize) -> Option<LogRecord> {
    let mut cur = buf.get(offset..)?;
    if cur.remaining() < RECORD_OVERHEAD {
        return None;
    }

    let kind = RecordKind::from_byte(cur.get_u8())?;

    let key_len = cur.get_u32() as usize;
    if cur.remaining() < key_len + 4 {
        return None;
    }
    let key = String::from_utf8_lossy(&cur[..key_len]).into_owned();
    cur.advance(key_len);

    let value_len = cur.get_u32();
    if cur.remaining() < value_len as usize {
        return None;
    }
    let value = String::from_utf8_lossy(&cur[..value_len as usize]).into_owned();

    Some(LogRecord {
        kind,
        key,
        value,
        offset: offset as u64,
        size: (RECORD_OVERHEAD + key_len + value_len as usize) as u64,
        value_len,
    })
}

/// Iterates the records of a log buffer in write order.
///
/// Iteration stops at the first record that cannot be decoded; its offset
/// is available from [`RecordIter::corrupt_offset`] afterwards.
pub struct RecordIter<'a> {
    buf: &'a [u8],
    offset: usize,
    corrupt: Option<u64>,
}

impl<'a> RecordIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            corrupt: None,
        }
    }

    /// Offset of the undecodable record that ended iteration, if any.
    pub fn corrupt_offset(&self) -> Option<u64> {
        self.corrupt
    }

    /// Offset just past the last decoded record.
    pub fn valid_len(&self) -> u64 {
        self.offset as u64
    }
}

impl Iterator for RecordIter<'_> {
    type Item = LogRecord;

    fn next(&mut self) -> Option<LogRecord> {
        if self.offset >= self.buf.len() || self.corrupt.is_some() {
            return None;
        }

        match decode_record(self.buf, self.offset) {
            Some(record) => {
                self.offset += record.size as usize;
                Some(record)
            }
            None => {
                self.corrupt = Some(self.offset as u64);
                None
            }
        }
    }
}

/// Reads every record of a log on startup.
///
/// An undecodable tail (a torn write from a crash) is cut off so that later
/// appends are not hidden behind it.
pub async fn load_log(file: &mut File, backend: &'static str) -> StorageResult<Vec<LogRecord>> {
    let buf = file_io::read_all(file).await?;
    let mut iter = RecordIter::new(&buf);
    let records: Vec<_> = iter.by_ref().collect();

    if let Some(offset) = iter.corrupt_offset() {
        warn!(
            backend,
            offset,
            discarded = buf.len() as u64 - offset,
            "Truncating corrupted log tail"
        );
        file.set_len(iter.valid_len()).await?;
        file.sync_all().await?;
    }

    Ok(records)
}
