//! Server commands: PING, ECHO, DBSIZE, FLUSHDB/FLUSHALL, INFO, COMMAND,
//! QUIT and INSPECT.

use super::handler::{command_count, CommandHandler};
use crate::protocol::{Command, RespValue};
use crate::storage::StorageResult;
use std::fmt::Write;
use std::sync::atomic::Ordering;

/// INFO sections in output order.
const INFO_SECTIONS: &[&str] = &["server", "storage", "clients", "stats"];

impl CommandHandler {
    pub(crate) async fn dispatch_server(&self, command: &Command) -> StorageResult<RespValue> {
        match command.name.as_str() {
            "PING" => Ok(self.cmd_ping(command)),
            "ECHO" => Ok(self.cmd_echo(command)),
            "DBSIZE" => self.cmd_dbsize(command).await,
            "FLUSHDB" | "FLUSHALL" => self.cmd_flushdb(command).await,
            "INFO" => self.cmd_info(command).await,
            "COMMAND" => Ok(self.cmd_command(command)),
            "QUIT" => Ok(self.cmd_quit(command)),
            "INSPECT" => self.cmd_inspect(command).await,
            other => Ok(RespValue::err(format!("unknown command '{}'", other))),
        }
    }

    /// PING [message]
    fn cmd_ping(&self, command: &Command) -> RespValue {
        match command.args.as_slice() {
            [] => RespValue::pong(),
            [message] => RespValue::bulk_string(message.clone()),
            _ => RespValue::wrong_arity("ping"),
        }
    }

    /// ECHO message
    fn cmd_echo(&self, command: &Command) -> RespValue {
        match command.args.as_slice() {
            [message] => RespValue::bulk_string(message.clone()),
            _ => RespValue::wrong_arity("echo"),
        }
    }

    /// DBSIZE
    async fn cmd_dbsize(&self, command: &Command) -> StorageResult<RespValue> {
        if command.arity() != 0 {
            return Ok(RespValue::wrong_arity("dbsize"));
        }

        let size = self.backends.current().await.size().await?;
        Ok(RespValue::integer(size as i64))
    }

    /// FLUSHDB / FLUSHALL
    async fn cmd_flushdb(&self, command: &Command) -> StorageResult<RespValue> {
        if command.arity() != 0 {
            return Ok(RespValue::wrong_arity(&command.name));
        }

        let backend = self.backends.current().await;
        backend.clear().await?;
        tracing::info!(backend = backend.name(), "Database cleared");
        Ok(RespValue::ok())
    }

    /// INFO [section]
    async fn cmd_info(&self, command: &Command) -> StorageResult<RespValue> {
        let wanted: Vec<&str> = match command.args.as_slice() {
            [] => INFO_SECTIONS.to_vec(),
            [section] => match section.to_lowercase().as_str() {
                "all" | "everything" | "default" => INFO_SECTIONS.to_vec(),
                other => INFO_SECTIONS.iter().copied().filter(|s| *s == other).collect(),
            },
            _ => return Ok(RespValue::wrong_arity("info")),
        };

        let mut info = String::new();
        for section in wanted {
            match section {
                "server" => {
                    let _ = write!(
                        info,
                        "# Server\r\n\
                         logkv_version:{}\r\n\
                         os:{}\r\n\
                         uptime_in_seconds:{}\r\n\
                         data_dir:{}\r\n\
                         \r\n",
                        crate::VERSION,
                        std::env::consts::OS,
                        self.start_time.elapsed().as_secs(),
                        self.backends.data_dir().display(),
                    );
                }
                "storage" => {
                    let backend = self.backends.current().await;
                    let keys = backend.size().await?;
                    let _ = write!(
                        info,
                        "# Storage\r\nbackend:{}\r\ndb0_keys:{}\r\n\r\n",
                        backend.name(),
                        keys
                    );
                }
                "clients" => {
                    let _ = write!(
                        info,
                        "# Clients\r\nconnected_clients:{}\r\n\r\n",
                        self.stats.active_connections.load(Ordering::Relaxed)
                    );
                }
                "stats" => {
                    let _ = write!(
                        info,
                        "# Stats\r\n\
                         total_connections_received:{}\r\n\
                         total_commands_processed:{}\r\n\
                         total_net_input_bytes:{}\r\n\
                         total_net_output_bytes:{}\r\n\
                         \r\n",
                        self.stats.connections_accepted.load(Ordering::Relaxed),
                        self.stats.commands_processed.load(Ordering::Relaxed),
                        self.stats.bytes_read.load(Ordering::Relaxed),
                        self.stats.bytes_written.load(Ordering::Relaxed),
                    );
                }
                _ => {}
            }
        }

        Ok(RespValue::bulk_string(info))
    }

    /// COMMAND [DOCS|COUNT]
    ///
    /// Just enough for generic clients such as redis-cli, which send
    /// `COMMAND DOCS` on connect.
    fn cmd_command(&self, command: &Command) -> RespValue {
        match command.args.first().map(|s| s.to_uppercase()).as_deref() {
            Some("COUNT") => RespValue::integer(command_count() as i64),
            _ => RespValue::array(vec![]),
        }
    }

    /// QUIT - the connection closes after the reply is written
    fn cmd_quit(&self, command: &Command) -> RespValue {
        if command.arity() != 0 {
            return RespValue::wrong_arity("quit");
        }
        RespValue::ok()
    }

    /// INSPECT - JSON snapshot of the active backend
    async fn cmd_inspect(&self, command: &Command) -> StorageResult<RespValue> {
        if command.arity() != 0 {
            return Ok(RespValue::wrong_arity("inspect"));
        }

        let state = self.backends.current().await.inspect().await?;
        Ok(RespValue::bulk_string(serde_json::to_string(&state)?))
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::handler::test_support::*;
    use crate::protocol::RespValue;
    use crate::storage::BackendKind;
    use bytes::Bytes;

    fn text(value: RespValue) -> String {
        match value {
            RespValue::BulkString(b) => String::from_utf8(b.to_vec()).unwrap(),
            other => panic!("expected bulk string, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let (_dir, handler) = create_handler(BackendKind::HashIndex).await;

        let response = run(&handler, &["PING"]).await;
        assert_eq!(response, RespValue::simple_string("PONG"));

        let response = run(&handler, &["PING", "hello"]).await;
        assert_eq!(response, RespValue::bulk_string(Bytes::from("hello")));

        assert!(run(&handler, &["PING", "a", "b"]).await.is_error());
    }

    #[tokio::test]
    async fn test_echo() {
        let (_dir, handler) = create_handler(BackendKind::HashIndex).await;

        let response = run(&handler, &["ECHO", "hello world"]).await;
        assert_eq!(response, RespValue::bulk_string(Bytes::from("hello world")));

        let response = run(&handler, &["ECHO"]).await;
        assert_eq!(
            response,
            RespValue::error("ERR wrong number of arguments for 'echo' command")
        );
    }

    #[tokio::test]
    async fn test_dbsize() {
        let (_dir, handler) = create_handler(BackendKind::AppendLog).await;

        let response = run(&handler, &["DBSIZE"]).await;
        assert_eq!(response, RespValue::integer(0));

        run(&handler, &["SET", "key1", "value1"]).await;
        run(&handler, &["SET", "key2", "value2"]).await;

        let response = run(&handler, &["DBSIZE"]).await;
        assert_eq!(response, RespValue::integer(2));
    }

    #[tokio::test]
    async fn test_flushdb() {
        for kind in BackendKind::ALL {
            let (_dir, handler) = create_handler(kind).await;

            run(&handler, &["SET", "key1", "value1"]).await;
            run(&handler, &["SET", "key2", "value2"]).await;

            let response = run(&handler, &["FLUSHDB"]).await;
            assert_eq!(response, RespValue::ok());
            assert_eq!(run(&handler, &["DBSIZE"]).await, RespValue::integer(0));

            run(&handler, &["SET", "key3", "value3"]).await;
            assert_eq!(run(&handler, &["FLUSHALL"]).await, RespValue::ok());
            assert_eq!(run(&handler, &["GET", "key3"]).await, RespValue::null());
        }
    }

    #[tokio::test]
    async fn test_info() {
        let (_dir, handler) = create_handler(BackendKind::HashIndex).await;
        run(&handler, &["SET", "a", "1"]).await;

        let info = text(run(&handler, &["INFO"]).await);
        assert!(info.starts_with("# Server\r\n"));
        assert!(info.contains("uptime_in_seconds:"));
        assert!(info.contains("# Storage\r\nbackend:hash-index\r\ndb0_keys:1\r\n"));
        assert!(info.contains("# Clients"));
        assert!(info.contains("total_commands_processed:"));

        let storage = text(run(&handler, &["INFO", "Storage"]).await);
        assert!(storage.starts_with("# Storage"));
        assert!(!storage.contains("# Server"));

        assert_eq!(text(run(&handler, &["INFO", "keyspace"]).await), "");
    }

    #[tokio::test]
    async fn test_command() {
        let (_dir, handler) = create_handler(BackendKind::HashIndex).await;

        assert_eq!(run(&handler, &["COMMAND"]).await, RespValue::array(vec![]));
        assert_eq!(
            run(&handler, &["COMMAND", "DOCS"]).await,
            RespValue::array(vec![])
        );
        assert_eq!(
            run(&handler, &["command", "count"]).await,
            RespValue::integer(14)
        );
    }

    #[tokio::test]
    async fn test_quit() {
        let (_dir, handler) = create_handler(BackendKind::HashIndex).await;

        assert_eq!(run(&handler, &["QUIT"]).await, RespValue::ok());
        assert!(run(&handler, &["QUIT", "now"]).await.is_error());
    }

    #[tokio::test]
    async fn test_inspect() {
        let (_dir, handler) = create_handler(BackendKind::HashIndex).await;
        run(&handler, &["SET", "name", "logkv"]).await;

        let json: serde_json::Value =
            serde_json::from_str(&text(run(&handler, &["INSPECT"]).await)).unwrap();
        assert_eq!(json["name"], "hash-index");
        assert_eq!(json["keyCount"], 1);
        assert_eq!(json["details"]["indexSize"], 1);
        assert_eq!(json["details"]["indexEntries"][0]["key"], "name");
        assert_eq!(json["details"]["wal"]["entryCount"], 1);

        handler.backends().switch("append-log").await.unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&text(run(&handler, &["INSPECT"]).await)).unwrap();
        assert_eq!(json["name"], "append-log");
        assert_eq!(json["details"]["recentRecords"][0]["type"], "SET");
        assert_eq!(json["details"]["recentRecords"][0]["value"], "logkv");
    }
}
