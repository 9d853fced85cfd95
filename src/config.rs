//! Server configuration.
//!
//! Every option can come from the command line or from an `ENGINE_*`
//! environment variable; the command line wins.

use crate::storage::BackendKind;
use clap::Parser;
use std::path::PathBuf;

/// logkv - a RESP key-value server with swappable log-based storage
#[derive(Parser, Debug, Clone)]
#[command(name = "logkv")]
#[command(version)]
pub struct Config {
    /// Host to bind to
    #[arg(short = 'H', long, env = "ENGINE_HOST", default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "ENGINE_PORT", default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Directory holding the log files
    #[arg(short, long, env = "ENGINE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Storage backend to start with (append-log, hash-index)
    #[arg(short, long, env = "ENGINE_BACKEND", default_value = "hash-index")]
    pub backend: BackendKind,

    /// Default log filter; RUST_LOG overrides it
    #[arg(long, env = "ENGINE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["logkv"]).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:6380");
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.backend, BackendKind::HashIndex);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "logkv",
            "--host",
            "0.0.0.0",
            "-p",
            "7000",
            "--data-dir",
            "/tmp/logkv",
            "--backend",
            "append-log",
        ])
        .unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:7000");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/logkv"));
        assert_eq!(config.backend, BackendKind::AppendLog);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = Config::try_parse_from(["logkv", "--backend", "b-tree"]).unwrap_err();
        assert!(err.to_string().contains("unknown backend 'b-tree'"));
    }
}
