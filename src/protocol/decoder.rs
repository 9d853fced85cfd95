//! Incremental, per-connection command decoder.
//!
//! Socket reads arrive in arbitrary chunks: half a command, several
//! pipelined commands, or both. The decoder owns the buffer that carries a
//! partial command over to the next read, and turns every complete value at
//! the front of the buffer into a [`Command`].
//!
//! A malformed inline line is dropped up to its newline and decoding goes
//! on. A malformed RESP frame cannot be skipped that way: its length
//! headers are untrustworthy, so its payload lines could be mistaken for
//! commands. The decoder then discards everything and stays desynced; the
//! connection is expected to reply once and close.

use crate::protocol::command::Command;
use crate::protocol::parser::{blank_line_len, ParseError, RespParser};
use crate::protocol::types::prefix;
use bytes::{Buf, BytesMut};
use tracing::trace;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Outcome of decoding one request: a command, or an error to report back
/// to the client in its place.
pub type Decoded = Result<Command, ParseError>;

/// Buffers raw bytes and yields complete commands.
///
/// # Example
///
/// ```
/// use logkv::protocol::RespDecoder;
///
/// let mut decoder = RespDecoder::new();
/// assert!(decoder.feed(b"*2\r\n$3\r\nGET\r\n").is_empty());
///
/// let commands = decoder.feed(b"$3\r\nfoo\r\nPING\r\n");
/// assert_eq!(commands.len(), 2);
/// assert_eq!(commands[0].as_ref().unwrap().name, "GET");
/// assert_eq!(commands[1].as_ref().unwrap().name, "PING");
/// ```
#[derive(Debug)]
pub struct RespDecoder {
    buffer: BytesMut,
    parser: RespParser,
    /// Set after a framing error; no further input is decoded
    desynced: bool,
}

impl RespDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: RespParser::new(),
            desynced: false,
        }
    }

    /// Appends `data` and returns every request completed by it, in order.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Decoded> {
        self.buffer.extend_from_slice(data);
        self.drain()
    }

    /// Decodes every complete request currently buffered.
    ///
    /// Used together with [`buffer_mut`](Self::buffer_mut) when the caller
    /// reads from the socket straight into the decoder's buffer.
    pub fn drain(&mut self) -> Vec<Decoded> {
        let mut decoded = Vec::new();

        while !self.desynced && !self.buffer.is_empty() {
            if let Some(len) = blank_line_len(&self.buffer) {
                self.buffer.advance(len);
                continue;
            }

            match self.parser.parse(&self.buffer) {
                Ok(Some((value, consumed))) => {
                    self.buffer.advance(consumed);
                    trace!(consumed, remaining = self.buffer.len(), "Parsed request");
                    decoded.push(Command::from_value(value).ok_or(ParseError::InvalidCommand));
                }
                Ok(None) => break,
                Err(e) if self.line_recoverable(&e) => {
                    self.skip_line();
                    decoded.push(Err(e));
                }
                Err(e) => {
                    self.buffer.clear();
                    self.desynced = true;
                    decoded.push(Err(e));
                }
            }
        }

        decoded
    }

    /// Whether `error` came from an inline line whose end is known.
    fn line_recoverable(&self, error: &ParseError) -> bool {
        let inline = !matches!(
            self.buffer.first(),
            Some(
                &prefix::ARRAY
                    | &prefix::BULK_STRING
                    | &prefix::SIMPLE_STRING
                    | &prefix::ERROR
                    | &prefix::INTEGER
            )
        );
        inline && !matches!(error, ParseError::MessageTooLarge { .. })
    }

    /// Whether a framing error has stopped decoding for good.
    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    /// Drops input up to and including the next newline so decoding can
    /// resume after malformed data.
    fn skip_line(&mut self) {
        let len = self
            .buffer
            .iter()
            .position(|&b| b == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(self.buffer.len());
        self.buffer.advance(len);
    }

    /// Direct access to the read buffer.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Number of bytes waiting for the rest of a request.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards any buffered partial input.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.desynced = false;
    }
}

impl Default for RespDecoder {
    fn default() -> Self {
        Self::new()
    }
}
