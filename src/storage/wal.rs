//! Write-Ahead Log for the hash-index backend.
//!
//! Every mutation is framed, checksummed and synced here before it touches
//! the main log, so a crash between the two writes loses nothing.
//!
//! ## Frame Format
//!
//! ```text
//! ┌──────────────────┬──────────────┬───────────────────────────────┐
//! │ payloadLen (4B)  │ crc32 (4B)   │ payload (payloadLen bytes)    │
//! └──────────────────┴──────────────┴───────────────────────────────┘
//! ```
//!
//! The payload is a main-log record (see [`record`](crate::storage::record)).
//! Recovery reads frames until the first truncated or checksum-failing one.
//! The bytes from there on are reported as corrupted.
//!
//! A frame is as large as the record it carries, up to the u32 length
//! field. There is no smaller cap: anything the write path accepted must be
//! replayable.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::file_io;
use crate::storage::record::{decode_record, encode_record, RecordKind};
use bytes::{Buf, BufMut, BytesMut};
use crc32fast::Hasher;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tracing::{debug, warn};

/// payloadLen + crc32
pub const WAL_HEADER_SIZE: usize = 8;

/// How many entries `inspect` lists.
const INSPECT_ENTRIES: usize = 50;

/// A valid entry read back from the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalEntry {
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub key: String,
    pub value: String,
    pub offset: u64,
    pub size: u64,
}

/// Result of scanning the WAL.
#[derive(Debug, Default)]
pub struct WalRecovery {
    pub entries: Vec<WalEntry>,
    /// Bytes after the last valid frame
    pub corrupted_bytes: u64,
    /// Bytes the WAL held when it was scanned
    pub bytes: u64,
}

/// `inspect` view of the WAL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalState {
    pub file_path: String,
    pub file_size_bytes: u64,
    pub entry_count: usize,
    pub corrupted_bytes: u64,
    pub entries: Vec<WalEntry>,
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Frames one operation.
pub fn encode_frame(kind: RecordKind, key: &str, value: &str) -> StorageResult<BytesMut> {
    let payload = encode_record(kind, key, value)?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| StorageError::TooLarge {
        what: "record",
        len: payload.len(),
    })?;
    let mut frame = BytesMut::with_capacity(WAL_HEADER_SIZE + payload.len());
    frame.put_u32(payload_len);
    frame.put_u32(checksum(&payload));
    frame.put_slice(&payload);
    Ok(frame)
}

/// Decodes every valid frame in `buf`.
pub fn decode_frames(buf: &[u8]) -> WalRecovery {
    let mut recovery = WalRecovery {
        bytes: buf.len() as u64,
        ..WalRecovery::default()
    };
    let mut offset = 0usize;

    while offset < buf.len() {
        let mut header = &buf[offset..];
        if header.remaining() < WAL_HEADER_SIZE {
            warn!(offset, "Truncated WAL header");
            break;
        }

        let payload_len = header.get_u32() as usize;
        let stored_crc = header.get_u32();

        if header.remaining() < payload_len {
            warn!(offset, payload_len, "Truncated WAL payload");
            break;
        }

        let payload = &header[..payload_len];
        let computed = checksum(payload);
        if computed != stored_crc {
            warn!(
                offset,
                stored = %format!("{:08x}", stored_crc),
                computed = %format!("{:08x}", computed),
                "WAL checksum mismatch"
            );
            break;
        }

        let record = match decode_record(payload, 0) {
            Some(record) if record.size as usize == payload_len => record,
            _ => {
                warn!(offset, "Malformed WAL payload");
                break;
            }
        };

        let size = (WAL_HEADER_SIZE + payload_len) as u64;
        recovery.entries.push(WalEntry {
            kind: record.kind,
            key: record.key,
            value: record.value,
            offset: offset as u64,
            size,
        });
        offset += size as usize;
    }

    recovery.corrupted_bytes = (buf.len() - offset) as u64;
    recovery
}

/// Append-only, checksummed operation log.
pub struct WriteAheadLog {
    path: PathBuf,
    file: File,
    /// End of the last complete append
    len: u64,
}

impl WriteAheadLog {
    pub async fn open(path: &Path) -> StorageResult<Self> {
        let file = file_io::open_append(path).await?;
        let len = file_io::file_len(&file).await?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably records one operation.
    pub async fn append(&mut self, kind: RecordKind, key: &str, value: &str) -> StorageResult<()> {
        let frame = encode_frame(kind, key, value)?;
        file_io::append_at_end(&mut self.file, self.len, &frame).await?;
        self.len += frame.len() as u64;
        Ok(())
    }

    /// Reads back every valid entry.
    pub async fn recover(&mut self) -> StorageResult<WalRecovery> {
        let buf = file_io::read_all(&mut self.file).await?;
        let recovery = decode_frames(&buf);
        if !recovery.entries.is_empty() || recovery.corrupted_bytes > 0 {
            debug!(
                entries = recovery.entries.len(),
                corrupted_bytes = recovery.corrupted_bytes,
                "WAL scanned"
            );
        }
        Ok(recovery)
    }

    /// Empties the WAL once its contents are safely in the main log.
    ///
    /// Returns the number of entries and bytes discarded.
    pub async fn checkpoint(&mut self) -> StorageResult<(usize, u64)> {
        let recovery = self.recover().await?;
        file_io::truncate(&mut self.file).await?;
        self.len = 0;
        debug!(
            entries = recovery.entries.len(),
            bytes = recovery.bytes,
            "WAL checkpoint complete"
        );
        Ok((recovery.entries.len(), recovery.bytes))
    }

    pub async fn inspect(&mut self) -> StorageResult<WalState> {
        let mut recovery = self.recover().await?;
        let entry_count = recovery.entries.len();
        recovery.entries.truncate(INSPECT_ENTRIES);

        Ok(WalState {
            file_path: self.path.display().to_string(),
            file_size_bytes: recovery.bytes,
            entry_count,
            corrupted_bytes: recovery.corrupted_bytes,
            entries: recovery.entries,
        })
    }

    pub async fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all().await?;
        Ok(())
    }
}
