//! DEBUG subcommands: backend selection, flush and WAL checkpoint.

use super::handler::CommandHandler;
use crate::protocol::{Command, RespValue};
use crate::storage::{BackendKind, StorageResult};
use tracing::info;

impl CommandHandler {
    pub(crate) async fn dispatch_debug(&self, command: &Command) -> StorageResult<RespValue> {
        let Some((sub, rest)) = command.args.split_first() else {
            return Ok(RespValue::wrong_arity("debug"));
        };

        match (sub.to_uppercase().as_str(), rest) {
            ("BACKEND", []) => Ok(RespValue::bulk_string(self.backends.active_name().await)),
            ("BACKEND", [name]) => self.debug_switch_backend(name).await,
            ("BACKENDS", []) => Ok(RespValue::string_array(BackendKind::names())),
            ("FLUSH", []) => {
                self.backends.current().await.flush().await?;
                Ok(RespValue::ok())
            }
            ("WALCHECKPOINT", []) => self.debug_wal_checkpoint().await,
            ("BACKEND" | "BACKENDS" | "FLUSH" | "WALCHECKPOINT", _) => Ok(RespValue::err(
                format!("wrong number of arguments for 'debug {}'", sub.to_lowercase()),
            )),
            (other, _) => Ok(RespValue::err(format!("unknown DEBUG subcommand '{}'", other))),
        }
    }

    /// DEBUG BACKEND <name>
    async fn debug_switch_backend(&self, name: &str) -> StorageResult<RespValue> {
        match self.backends.switch(name).await? {
            Some(_) => Ok(RespValue::ok()),
            None => Ok(RespValue::err(format!("unknown backend '{}'", name))),
        }
    }

    /// DEBUG WALCHECKPOINT
    async fn debug_wal_checkpoint(&self) -> StorageResult<RespValue> {
        let backend = self.backends.current().await;
        match backend.wal_checkpoint().await? {
            Some(checkpoint) => {
                info!(
                    backend = backend.name(),
                    entries = checkpoint.entries_cleared,
                    bytes = checkpoint.bytes_cleared,
                    "WAL checkpoint"
                );
                Ok(RespValue::ok())
            }
            None => Ok(RespValue::err(format!(
                "backend '{}' does not support WAL checkpoint",
                backend.name()
            ))),
        }
    }
}
