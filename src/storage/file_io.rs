//! Small async file primitives used by the log-based backends.

use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::warn;

/// Opens (creating if needed) a log file in append mode.
///
/// Writes always land at the end of the file; reads go through explicit
/// seeks.
pub async fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .await
}

/// Appends `data` and waits until it has reached the disk.
pub async fn append_durable(file: &mut File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.flush().await?;
    file.sync_data().await
}

/// Appends `data` to a file whose valid contents end at `end`, and waits
/// until it has reached the disk.
///
/// Bytes past `end` are left over from an earlier failed write and are cut
/// off first. If this write fails, the file is cut back to `end` so no
/// partial record stays behind.
pub async fn append_at_end(file: &mut File, end: u64, data: &[u8]) -> std::io::Result<()> {
    if file_len(file).await? > end {
        warn!(end, "Discarding bytes past the last complete write");
        file.set_len(end).await?;
    }

    if let Err(e) = append_durable(file, data).await {
        if let Err(rollback) = file.set_len(end).await {
            warn!(end, error = %rollback, "Failed to roll back partial write");
        }
        return Err(e);
    }
    Ok(())
}

/// Reads the whole file from the start.
pub async fn read_all(file: &mut File) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0)).await?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Reads exactly `len` bytes starting at `offset`.
pub async fn read_at(file: &mut File, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Empties the file.
pub async fn truncate(file: &mut File) -> std::io::Result<()> {
    file.set_len(0).await?;
    file.sync_all().await
}

/// Current size of the file in bytes.
pub async fn file_len(file: &File) -> std::io::Result<u64> {
    Ok(file.metadata().await?.len())
}
