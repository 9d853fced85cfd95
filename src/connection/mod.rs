//! Connection Handler Module
//!
//! This module manages individual client connections.
//! Each client connection is handled by its own async task with its own
//! decoder; the active storage backend is the only state they share.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ RespDecoder │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send resp   │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Pipelining**: Several commands in one read are answered in order
//! - **Inline commands**: Plain-text clients can send `SET k "a b"\r\n`
//! - **Error isolation**: Bad commands and backend failures become error
//!   replies and the connection stays open. A broken RESP frame is answered
//!   once, then the connection is closed
//! - **Statistics**: Tracks connection and command metrics
//!
//! ## Example
//!
//! ```ignore
//! use logkv::commands::CommandHandler;
//! use logkv::connection::{handle_connection, ConnectionStats};
//! use logkv::storage::{BackendKind, BackendManager};
//! use std::sync::Arc;
//!
//! let backends = Arc::new(BackendManager::open("./data", BackendKind::HashIndex).await?);
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(backends, Arc::clone(&stats));
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler.clone(), stats));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
