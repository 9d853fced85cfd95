//! Command Handler Module
//!
//! Routes parsed commands to the active storage backend or to the server's
//! own handlers, and turns the results into RESP replies.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RespDecoder    │  (protocol module)
//! └────────┬────────┘
//!          │ Command
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Classify     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ BackendManager  │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! ### Data Commands
//! - `SET key value`, `GET key`
//! - `DEL key [key ...]`, `EXISTS key [key ...]`
//!
//! ### Server Commands
//! - `PING [message]`, `ECHO message`
//! - `DBSIZE`, `FLUSHDB`, `FLUSHALL`
//! - `INFO [section]`, `COMMAND [DOCS|COUNT]`
//! - `INSPECT`, `QUIT`
//!
//! ### Debug Commands
//! - `DEBUG BACKEND [name]`, `DEBUG BACKENDS`
//! - `DEBUG FLUSH`, `DEBUG WALCHECKPOINT`

mod debug;
pub mod handler;
mod server;
mod string;

pub use handler::{command_count, CommandGroup, CommandHandler};
