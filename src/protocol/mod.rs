//! RESP Protocol Implementation
//!
//! The wire codec between clients and the engine.
//!
//! ## Modules
//!
//! - `types`: The `RespValue` enum, its encoder and reply helpers
//! - `parser`: Parses one RESP value (or inline command) from a byte slice
//! - `command`: Turns a decoded value into a [`Command`]
//! - `decoder`: Per-connection incremental decoder over a byte stream
//!
//! ## Example
//!
//! ```
//! use logkv::protocol::{RespDecoder, RespValue};
//!
//! let mut decoder = RespDecoder::new();
//! let commands = decoder.feed(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n");
//! assert_eq!(commands[0].as_ref().unwrap().args, vec!["name"]);
//!
//! let response = RespValue::bulk_string("logkv");
//! assert_eq!(response.serialize(), b"$5\r\nlogkv\r\n");
//! ```

pub mod command;
pub mod decoder;
pub mod parser;
pub mod types;

pub use command::Command;
pub use decoder::{Decoded, RespDecoder};
pub use parser::{parse_message, ParseError, ParseResult, RespParser};
pub use types::RespValue;
