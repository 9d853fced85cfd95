//! Backend registry and the engine-wide active-backend slot.
//!
//! ```text
//!   connection ──read──┐
//!   connection ──read──┼──> RwLock<Arc<dyn StorageBackend>> <──write── DEBUG BACKEND <name>
//!   connection ──read──┘
//! ```
//!
//! Every command holds a read guard while it runs, so a switch waits for
//! in-flight commands and the next command on any connection sees the new
//! backend.

use crate::storage::append_log::{self, AppendLog};
use crate::storage::backend::StorageBackend;
use crate::storage::error::StorageResult;
use crate::storage::hash_index::{self, HashIndex};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{info, warn};

/// The closed set of backends the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    AppendLog,
    HashIndex,
}

impl BackendKind {
    /// Registration order, as reported by `DEBUG BACKENDS`.
    pub const ALL: [BackendKind; 2] = [BackendKind::AppendLog, BackendKind::HashIndex];

    pub fn name(self) -> &'static str {
        match self {
            BackendKind::AppendLog => append_log::NAME,
            BackendKind::HashIndex => hash_index::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Registered names.
    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(BackendKind::name)
    }

    /// Constructs a fresh instance over `data_dir`.
    pub async fn open(self, data_dir: &Path) -> StorageResult<Arc<dyn StorageBackend>> {
        let backend: Arc<dyn StorageBackend> = match self {
            BackendKind::AppendLog => Arc::new(AppendLog::open(data_dir).await?),
            BackendKind::HashIndex => Arc::new(HashIndex::open(data_dir).await?),
        };
        Ok(backend)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            format!(
                "unknown backend '{}' (available: {})",
                s,
                Self::names().collect::<Vec<_>>().join(", ")
            )
        })
    }
}

/// Owns the active backend and swaps it on request.
pub struct BackendManager {
    data_dir: PathBuf,
    active: RwLock<Arc<dyn StorageBackend>>,
}

impl BackendManager {
    /// Opens `kind` over `data_dir` and makes it active.
    pub async fn open(data_dir: impl Into<PathBuf>, kind: BackendKind) -> StorageResult<Self> {
        let data_dir = data_dir.into();
        let backend = kind.open(&data_dir).await?;
        info!(backend = kind.name(), data_dir = %data_dir.display(), "Storage backend ready");

        Ok(Self {
            data_dir,
            active: RwLock::new(backend),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The active backend, held for the duration of one command.
    pub async fn current(&self) -> RwLockReadGuard<'_, Arc<dyn StorageBackend>> {
        self.active.read().await
    }

    /// Name of the active backend.
    pub async fn active_name(&self) -> &'static str {
        self.active.read().await.name()
    }

    /// Makes the backend called `name` active.
    ///
    /// Returns `Ok(None)` for an unregistered name, leaving the active
    /// backend untouched. The old backend is closed after the new one has
    /// opened; a close failure is logged and otherwise ignored.
    pub async fn switch(&self, name: &str) -> StorageResult<Option<Arc<dyn StorageBackend>>> {
        let Some(kind) = BackendKind::from_name(name) else {
            return Ok(None);
        };

        let mut active = self.active.write().await;
        if active.name() == kind.name() {
            info!(backend = kind.name(), "Backend already active");
            return Ok(Some(Arc::clone(&*active)));
        }

        let next = kind.open(&self.data_dir).await?;
        let previous = std::mem::replace(&mut *active, Arc::clone(&next));
        if let Err(e) = previous.close().await {
            warn!(backend = previous.name(), error = %e, "Failed to close previous backend");
        }

        info!(from = previous.name(), to = kind.name(), "Switched storage backend");
        Ok(Some(next))
    }

    /// Flushes and closes the active backend.
    pub async fn shutdown(&self) -> StorageResult<()> {
        let active = self.active.read().await;
        active.flush().await?;
        active.close().await?;
        info!(backend = active.name(), "Storage backend closed");
        Ok(())
    }
}
