//! Error types for the storage layer.

use thiserror::Error;

/// Result type alias for backend operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Failures surfaced by storage backends.
///
/// Command handlers turn every variant into an `ERR internal error: ...`
/// reply; none of them ends the connection.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure (open, append, seek, fsync, truncate)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record on disk could not be decoded where one was expected
    #[error("corrupted record at offset {offset}: {reason}")]
    Corrupted { offset: u64, reason: String },

    /// The backend was closed (usually by a backend switch)
    #[error("backend '{0}' is closed")]
    Closed(&'static str),

    /// Keys and values are length-prefixed with a u32
    #[error("{what} too large: {len} bytes")]
    TooLarge { what: &'static str, len: usize },

    /// The state snapshot could not be rendered
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
