//! Storage Module
//!
//! Pluggable persistence strategies behind one async capability interface.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     BackendManager                          │
//! │            RwLock<Arc<dyn StorageBackend>>                  │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!      ┌──────────────────┐           ┌──────────────────┐
//!      │    AppendLog     │           │    HashIndex     │
//!      │  O(n) scan reads │           │ HashMap → offset │
//!      └────────┬─────────┘           └───┬──────────┬───┘
//!               │                         │          │
//!               ▼                         ▼          ▼
//!        ┌────────────────────────────────────┐ ┌──────────┐
//!        │        engine.log (records)        │ │   WAL    │
//!        └────────────────────────────────────┘ └──────────┘
//! ```
//!
//! Both log backends share the on-disk record format and the log file, so
//! switching between them keeps the data. The [`Memtable`] is the sorted
//! write buffer for a future log-structured backend and is not served over
//! the wire.
//!
//! ## Example
//!
//! ```
//! use logkv::storage::{BackendKind, BackendManager};
//!
//! # tokio_test::block_on(async {
//! # let dir = tempfile::tempdir().unwrap();
//! let manager = BackendManager::open(dir.path(), BackendKind::HashIndex).await?;
//!
//! manager.current().await.set("lang", "rust").await?;
//! let value = manager.current().await.get("lang").await?;
//! assert_eq!(value.as_deref(), Some("rust"));
//!
//! manager.switch("append-log").await?;
//! assert_eq!(manager.active_name().await, "append-log");
//! # manager.shutdown().await?;
//! # Ok::<(), logkv::storage::StorageError>(())
//! # }).unwrap();
//! ```

pub mod append_log;
pub mod backend;
pub mod error;
pub mod file_io;
pub mod hash_index;
pub mod memtable;
pub mod record;
pub mod registry;
pub mod wal;

pub use append_log::AppendLog;
pub use backend::{BackendDetails, BackendState, StorageBackend, WalCheckpoint};
pub use error::{StorageError, StorageResult};
pub use hash_index::HashIndex;
pub use memtable::{Memtable, MemtableEntry};
pub use registry::{BackendKind, BackendManager};
