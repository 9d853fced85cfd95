//! Key/value commands: SET, GET, DEL, EXISTS.
//!
//! These run against the backend that is active when the command is
//! dispatched; the read guard is held until the reply is built.

use super::handler::CommandHandler;
use crate::protocol::{Command, RespValue};
use crate::storage::StorageResult;

impl CommandHandler {
    pub(crate) async fn dispatch_data(&self, command: &Command) -> StorageResult<RespValue> {
        match command.name.as_str() {
            "SET" => self.cmd_set(command).await,
            "GET" => self.cmd_get(command).await,
            "DEL" => self.cmd_del(command).await,
            "EXISTS" => self.cmd_exists(command).await,
            other => Ok(RespValue::err(format!("unknown command '{}'", other))),
        }
    }

    /// SET key value
    async fn cmd_set(&self, command: &Command) -> StorageResult<RespValue> {
        let [key, value] = command.args.as_slice() else {
            return Ok(RespValue::wrong_arity("set"));
        };

        self.backends.current().await.set(key, value).await?;
        Ok(RespValue::ok())
    }

    /// GET key
    async fn cmd_get(&self, command: &Command) -> StorageResult<RespValue> {
        let [key] = command.args.as_slice() else {
            return Ok(RespValue::wrong_arity("get"));
        };

        let value = self.backends.current().await.get(key).await?;
        Ok(RespValue::bulk_or_null(value))
    }

    /// DEL key [key ...] - returns how many keys existed
    async fn cmd_del(&self, command: &Command) -> StorageResult<RespValue> {
        if command.args.is_empty() {
            return Ok(RespValue::wrong_arity("del"));
        }

        let backend = self.backends.current().await;
        let mut deleted = 0;
        for key in &command.args {
            if backend.delete(key).await? {
                deleted += 1;
            }
        }
        Ok(RespValue::integer(deleted))
    }

    /// EXISTS key [key ...] - a key named twice is counted twice
    async fn cmd_exists(&self, command: &Command) -> StorageResult<RespValue> {
        if command.args.is_empty() {
            return Ok(RespValue::wrong_arity("exists"));
        }

        let backend = self.backends.current().await;
        let mut found = 0;
        for key in &command.args {
            if backend.contains(key).await? {
                found += 1;
            }
        }
        Ok(RespValue::integer(found))
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::handler::test_support::*;
    use crate::protocol::RespValue;
    use crate::storage::BackendKind;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_set_get() {
        for kind in BackendKind::ALL {
            let (_dir, handler) = create_handler(kind).await;

            let response = run(&handler, &["SET", "key", "value"]).await;
            assert_eq!(response, RespValue::ok());

            let response = run(&handler, &["GET", "key"]).await;
            assert_eq!(response, RespValue::bulk_string(Bytes::from("value")));
        }
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (_dir, handler) = create_handler(BackendKind::HashIndex).await;

        let response = run(&handler, &["GET", "nonexistent"]).await;
        assert_eq!(response, RespValue::null());
    }

    #[tokio::test]
    async fn test_set_arity() {
        let (_dir, handler) = create_handler(BackendKind::HashIndex).await;

        let response = run(&handler, &["SET", "key"]).await;
        assert_eq!(
            response,
            RespValue::error("ERR wrong number of arguments for 'set' command")
        );

        let response = run(&handler, &["SET", "key", "value", "EX"]).await;
        assert!(response.is_error());

        // Nothing was written.
        assert_eq!(run(&handler, &["DBSIZE"]).await, RespValue::integer(0));
    }

    #[tokio::test]
    async fn test_get_arity() {
        let (_dir, handler) = create_handler(BackendKind::AppendLog).await;

        let response = run(&handler, &["GET"]).await;
        assert_eq!(
            response,
            RespValue::error("ERR wrong number of arguments for 'get' command")
        );
        assert!(run(&handler, &["GET", "a", "b"]).await.is_error());
    }

    #[tokio::test]
    async fn test_del() {
        for kind in BackendKind::ALL {
            let (_dir, handler) = create_handler(kind).await;

            run(&handler, &["SET", "key1", "value1"]).await;
            run(&handler, &["SET", "key2", "value2"]).await;

            let response = run(&handler, &["DEL", "key1", "key2", "key3"]).await;
            assert_eq!(response, RespValue::integer(2));

            let response = run(&handler, &["DEL", "key1"]).await;
            assert_eq!(response, RespValue::integer(0));

            assert!(run(&handler, &["DEL"]).await.is_error());
        }
    }

    #[tokio::test]
    async fn test_exists() {
        for kind in BackendKind::ALL {
            let (_dir, handler) = create_handler(kind).await;

            run(&handler, &["SET", "b", "1"]).await;

            let response = run(&handler, &["EXISTS", "a", "b", "c"]).await;
            assert_eq!(response, RespValue::integer(1));

            let response = run(&handler, &["EXISTS", "b", "b"]).await;
            assert_eq!(response, RespValue::integer(2));

            run(&handler, &["DEL", "b"]).await;
            let response = run(&handler, &["EXISTS", "b"]).await;
            assert_eq!(response, RespValue::integer(0));
        }
    }

    #[tokio::test]
    async fn test_size_counts_latest_operation() {
        for kind in BackendKind::ALL {
            let (_dir, handler) = create_handler(kind).await;

            run(&handler, &["SET", "a", "1"]).await;
            run(&handler, &["SET", "a", "2"]).await;
            run(&handler, &["DEL", "a"]).await;
            run(&handler, &["SET", "b", "1"]).await;

            assert_eq!(run(&handler, &["DBSIZE"]).await, RespValue::integer(1));
        }
    }
}
