//! Command Router
//!
//! Classifies each parsed [`Command`] into one of three disjoint groups and
//! dispatches it to the matching handler set.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────────┐  │
//! │  │ classify()  │───>│ dispatch()  │───>│ data / server / │  │
//! │  └─────────────┘    └─────────────┘    │ debug handlers  │  │
//! │                                        └────────┬────────┘  │
//! │                                                 ▼           │
//! │                                 BackendManager::current()   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers check arity before touching the backend, so a malformed write
//! never partially applies. Backend failures become
//! `ERR internal error: <message>` replies.

use crate::connection::ConnectionStats;
use crate::protocol::{Command, RespValue};
use crate::storage::{BackendManager, StorageError};
use std::sync::Arc;
use std::time::Instant;

/// Commands that read or write keys on the active backend.
pub const DATA_COMMANDS: &[&str] = &["SET", "GET", "DEL", "EXISTS"];

/// Connection, server and introspection commands.
pub const SERVER_COMMANDS: &[&str] = &[
    "PING", "ECHO", "DBSIZE", "FLUSHDB", "FLUSHALL", "INFO", "COMMAND", "QUIT", "INSPECT",
];

/// Engine debugging commands.
pub const DEBUG_COMMANDS: &[&str] = &["DEBUG"];

/// Which handler set a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandGroup {
    Data,
    Server,
    Debug,
}

impl CommandGroup {
    /// Classifies an uppercase command name.
    pub fn classify(name: &str) -> Option<Self> {
        if DATA_COMMANDS.contains(&name) {
            Some(CommandGroup::Data)
        } else if SERVER_COMMANDS.contains(&name) {
            Some(CommandGroup::Server)
        } else if DEBUG_COMMANDS.contains(&name) {
            Some(CommandGroup::Debug)
        } else {
            None
        }
    }
}

/// Number of top-level commands the server answers.
pub fn command_count() -> usize {
    DATA_COMMANDS.len() + SERVER_COMMANDS.len() + DEBUG_COMMANDS.len()
}

/// Executes commands against the engine's active backend.
///
/// Cheap to clone; one clone is handed to each connection.
#[derive(Clone)]
pub struct CommandHandler {
    pub(crate) backends: Arc<BackendManager>,
    pub(crate) stats: Arc<ConnectionStats>,
    /// Server start time for INFO
    pub(crate) start_time: Instant,
}

impl CommandHandler {
    pub fn new(backends: Arc<BackendManager>, stats: Arc<ConnectionStats>) -> Self {
        Self {
            backends,
            stats,
            start_time: Instant::now(),
        }
    }

    pub fn backends(&self) -> &Arc<BackendManager> {
        &self.backends
    }

    /// Executes a command and returns the reply.
    pub async fn execute(&self, command: &Command) -> RespValue {
        let result = match CommandGroup::classify(&command.name) {
            Some(CommandGroup::Data) => self.dispatch_data(command).await,
            Some(CommandGroup::Server) => self.dispatch_server(command).await,
            Some(CommandGroup::Debug) => self.dispatch_debug(command).await,
            None => return RespValue::err(format!("unknown command '{}'", command.name)),
        };

        result.unwrap_or_else(internal_error)
    }
}

/// Wire reply for a failed backend operation.
pub(crate) fn internal_error(e: StorageError) -> RespValue {
    tracing::error!(error = %e, "Backend operation failed");
    RespValue::err(format!("internal error: {}", e))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::storage::BackendKind;
    use tempfile::TempDir;

    pub async fn create_handler(kind: BackendKind) -> (TempDir, CommandHandler) {
        let dir = TempDir::new().unwrap();
        let backends = Arc::new(BackendManager::open(dir.path(), kind).await.unwrap());
        let handler = CommandHandler::new(backends, Arc::new(ConnectionStats::new()));
        (dir, handler)
    }

    pub fn make_command(args: &[&str]) -> Command {
        Command::new(args[0], args[1..].iter().copied())
    }

    pub async fn run(handler: &CommandHandler, args: &[&str]) -> RespValue {
        handler.execute(&make_command(args)).await
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::storage::BackendKind;

    #[test]
    fn test_classify() {
        assert_eq!(CommandGroup::classify("GET"), Some(CommandGroup::Data));
        assert_eq!(CommandGroup::classify("FLUSHALL"), Some(CommandGroup::Server));
        assert_eq!(CommandGroup::classify("DEBUG"), Some(CommandGroup::Debug));
        assert_eq!(CommandGroup::classify("INCR"), None);
        assert_eq!(command_count(), 14);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (_dir, handler) = create_handler(BackendKind::HashIndex).await;

        let response = run(&handler, &["incr", "counter"]).await;
        assert_eq!(response, RespValue::error("ERR unknown command 'INCR'"));
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_internal_error() {
        let (_dir, handler) = create_handler(BackendKind::AppendLog).await;
        handler.backends().shutdown().await.unwrap();

        let response = run(&handler, &["GET", "k"]).await;
        assert_eq!(
            response,
            RespValue::error("ERR internal error: backend 'append-log' is closed")
        );

        // The handler keeps answering.
        assert_eq!(run(&handler, &["PING"]).await, RespValue::pong());
    }
}
