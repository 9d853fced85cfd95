//! # logkv - A RESP Key-Value Server with Swappable Log-Based Storage
//!
//! logkv speaks a subset of the Redis wire protocol (RESP) over TCP and
//! stores string keys and values in a log file on disk. Two storage
//! backends share that log and can be swapped at runtime:
//!
//! - **append-log**: every write is appended, every read scans the whole log
//! - **hash-index**: every write is appended, an in-memory index maps each
//!   key to the offset of its latest record, and a write-ahead log makes
//!   the index recoverable after a crash
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              logkv                               │
//! │                                                                  │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐           │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │           │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │           │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘           │
//! │                            │                  │                  │
//! │                            ▼                  ▼                  │
//! │                     ┌─────────────┐    ┌───────────────────────┐ │
//! │                     │    RESP     │    │    BackendManager     │ │
//! │                     │   Decoder   │    │  (active backend slot)│ │
//! │                     └─────────────┘    └───────────┬───────────┘ │
//! │                                                    │             │
//! │                                   ┌────────────────┴──────────┐  │
//! │                                   ▼                           ▼  │
//! │                            ┌─────────────┐           ┌──────────┐│
//! │                            │ append-log  │           │hash-index││
//! │                            └──────┬──────┘           └────┬─────┘│
//! │                                   │     engine.log        │      │
//! │                                   └───────────┬───────────┘      │
//! │                                               ▼                  │
//! │                                          data dir                │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use logkv::commands::CommandHandler;
//! use logkv::connection::ConnectionStats;
//! use logkv::storage::{BackendKind, BackendManager};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backends = Arc::new(BackendManager::open("./data", BackendKind::HashIndex).await?);
//!     let stats = Arc::new(ConnectionStats::new());
//!     let handler = CommandHandler::new(backends, Arc::clone(&stats));
//!
//!     let listener = TcpListener::bind("127.0.0.1:6380").await?;
//!     logkv::server::serve(listener, handler, stats, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP values, the frame parser and the streaming decoder
//! - [`storage`]: record codec, the two backends, WAL and backend registry
//! - [`commands`]: command classification and execution
//! - [`connection`]: per-client read/execute/reply loop
//! - [`server`]: accept loop and graceful shutdown
//! - [`config`]: command-line and environment configuration
//!
//! ## Design Highlights
//!
//! ### One Command at a Time per Connection
//!
//! Pipelined commands are decoded in order, executed one after another
//! and their replies flushed together. Different connections run
//! concurrently; each backend serialises its own file access.
//!
//! ### Runtime Backend Switching
//!
//! `DEBUG BACKEND <name>` closes the current backend and opens the other
//! one over the same data directory. A command holds the active slot for
//! its whole execution, so a switch waits for in-flight commands.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespDecoder, RespValue};
pub use storage::{BackendKind, BackendManager, StorageBackend};

/// The default port logkv listens on
pub const DEFAULT_PORT: u16 = 6380;

/// The default host logkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of logkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
