//! RESP Protocol Parser
//!
//! Parses a single RESP value from the front of a byte slice.
//!
//! ## How the Parser Works
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((value, consumed)))` - Successfully parsed a value, `consumed` bytes were used
//! - `Ok(None)` - Need more data, the message is incomplete
//! - `Err(ParseError)` - Invalid protocol data
//!
//! The parser never mutates the buffer; the caller (see
//! [`RespDecoder`](crate::protocol::RespDecoder)) advances past `consumed`
//! bytes once a value is complete, so an incomplete value is simply retried
//! when more data arrives.

use crate::protocol::types::{prefix, RespValue, CRLF};
use bytes::Bytes;
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur during RESP parsing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// Unknown type prefix byte
    #[error("unknown type prefix: {0:#04x}")]
    UnknownPrefix(u8),

    /// Invalid integer format
    #[error("protocol error: invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a simple string, error or length line
    #[error("protocol error: invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is negative (but not -1 for null)
    #[error("protocol error: invalid bulk length: {0}")]
    InvalidBulkLength(i64),

    /// Array length is negative (but not -1 for null)
    #[error("protocol error: invalid multibulk length: {0}")]
    InvalidArrayLength(i64),

    /// Protocol violation (missing CRLF, etc.)
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The message exceeds maximum allowed size
    #[error("protocol error: message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A complete value arrived but it is not an array of strings
    #[error("invalid command format")]
    InvalidCommand,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum array nesting depth (prevent stack overflow)
pub const MAX_NESTING_DEPTH: usize = 32;

/// Maximum length of an inline command or a RESP header line (64 KB, the
/// same inline limit as Redis)
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// A RESP protocol parser.
///
/// # Example
///
/// ```
/// use logkv::protocol::{RespParser, RespValue};
///
/// let mut parser = RespParser::new();
/// let (value, consumed) = parser.parse(b"+OK\r\n").unwrap().unwrap();
/// assert_eq!(value, RespValue::simple_string("OK"));
/// assert_eq!(consumed, 5);
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    /// Current nesting depth (for array parsing)
    depth: usize,
}

impl RespParser {
    /// Creates a new parser instance.
    pub fn new() -> Self {
        Self { depth: 0 }
    }

    /// Attempts to parse a RESP value from the buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((value, consumed)))` - Successfully parsed a value
    /// - `Ok(None)` - Incomplete data, need more bytes
    /// - `Err(e)` - Parse error
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        self.depth = 0;
        self.parse_value(buf)
    }

    fn parse_value(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::ProtocolError(format!(
                "maximum nesting depth exceeded: {}",
                MAX_NESTING_DEPTH
            )));
        }

        match buf[0] {
            prefix::SIMPLE_STRING => self.parse_simple_string(buf),
            prefix::ERROR => self.parse_error(buf),
            prefix::INTEGER => self.parse_integer(buf),
            prefix::BULK_STRING => self.parse_bulk_string(buf),
            prefix::ARRAY => self.parse_array(buf),
            // Inline commands are only valid at the top level.
            byte if self.depth > 0 => Err(ParseError::UnknownPrefix(byte)),
            _ => self.parse_inline(buf),
        }
    }

    /// Parses a simple string: `+<string>\r\n`
    fn parse_simple_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        Ok(read_line(buf)?.map(|(line, consumed)| {
            (RespValue::SimpleString(line.to_string()), consumed)
        }))
    }

    /// Parses an error: `-<error message>\r\n`
    fn parse_error(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        Ok(read_line(buf)?.map(|(line, consumed)| (RespValue::Error(line.to_string()), consumed)))
    }

    /// Parses an integer: `:<integer>\r\n`
    fn parse_integer(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        match read_line(buf)? {
            Some((line, consumed)) => Ok(Some((RespValue::Integer(parse_int(line)?), consumed))),
            None => Ok(None),
        }
    }

    /// Parses a bulk string: `$<length>\r\n<data>\r\n`
    fn parse_bulk_string(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let (length, header_len) = match read_line(buf)? {
            Some((line, consumed)) => (parse_int(line)?, consumed),
            None => return Ok(None),
        };

        if length == -1 {
            return Ok(Some((RespValue::Null, header_len)));
        }
        if length < 0 {
            return Err(ParseError::InvalidBulkLength(length));
        }

        let length = length as usize;
        if length > MAX_BULK_SIZE {
            return Err(ParseError::MessageTooLarge {
                size: length,
                max: MAX_BULK_SIZE,
            });
        }

        let total_needed = header_len + length + 2;
        if buf.len() < total_needed {
            return Ok(None);
        }

        if &buf[header_len + length..total_needed] != CRLF {
            return Err(ParseError::ProtocolError(
                "bulk string missing trailing CRLF".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[header_len..header_len + length]);
        Ok(Some((RespValue::BulkString(data), total_needed)))
    }

    /// Parses an array: `*<count>\r\n<elements...>`
    fn parse_array(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let (count, mut consumed) = match read_line(buf)? {
            Some((line, consumed)) => (parse_int(line)?, consumed),
            None => return Ok(None),
        };

        if count == -1 {
            return Ok(Some((RespValue::NullArray, consumed)));
        }
        if count < 0 {
            return Err(ParseError::InvalidArrayLength(count));
        }

        let count = count as usize;
        // Cap the preallocation; the count is attacker-controlled.
        let mut elements = Vec::with_capacity(count.min(1024));

        self.depth += 1;
        for _ in 0..count {
            match self.parse_value(&buf[consumed..])? {
                Some((value, element_consumed)) => {
                    elements.push(value);
                    consumed += element_consumed;
                }
                None => return Ok(None),
            }
        }
        self.depth -= 1;

        Ok(Some((RespValue::Array(elements), consumed)))
    }

    /// Parses an inline command: `SET key "hello world"\r\n`.
    ///
    /// Plain-text clients (telnet, `nc`) send space-separated tokens. A bare
    /// `\n` terminator is accepted too. The command is returned as an array
    /// of bulk strings, the same shape a RESP client would send.
    fn parse_inline(&mut self, buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
        let window = &buf[..buf.len().min(MAX_INLINE_SIZE + 1)];
        let newline = match window.iter().position(|&b| b == b'\n') {
            Some(pos) => pos,
            None if buf.len() > MAX_INLINE_SIZE => {
                return Err(ParseError::MessageTooLarge {
                    size: buf.len(),
                    max: MAX_INLINE_SIZE,
                })
            }
            None => return Ok(None),
        };

        let mut line = &buf[..newline];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }

        let line =
            std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;

        let elements = split_inline(line)
            .into_iter()
            .map(|token| RespValue::BulkString(Bytes::from(token)))
            .collect();

        Ok(Some((RespValue::Array(elements), newline + 1)))
    }
}

/// Returns the length of a leading blank line (whitespace only, newline
/// terminated), if the buffer starts with one.
///
/// Plain-text clients often send an empty line by pressing enter; those are
/// skipped rather than treated as commands.
pub fn blank_line_len(buf: &[u8]) -> Option<usize> {
    for (i, &b) in buf.iter().enumerate() {
        if b == b'\n' {
            return Some(i + 1);
        }
        if !b.is_ascii_whitespace() {
            return None;
        }
    }
    None
}

/// Splits an inline command on spaces, keeping double-quoted segments
/// together. A quote preceded by a backslash does not toggle quoting.
fn split_inline(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut prev: Option<char> = None;

    for ch in line.chars() {
        if ch == '"' && prev != Some('\\') {
            in_quotes = !in_quotes;
        } else if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
        prev = Some(ch);
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Reads the line following a type prefix byte.
///
/// Returns the line content (without prefix and CRLF) and the number of
/// bytes consumed including both.
///
/// A line longer than [`MAX_INLINE_SIZE`] is an error, so an unterminated
/// header is never rescanned without bound.
fn read_line(buf: &[u8]) -> ParseResult<Option<(&str, usize)>> {
    // prefix + line + CRLF
    let limit = buf.len().min(MAX_INLINE_SIZE + 3);
    match find_crlf(&buf[1..limit]) {
        Some(pos) => {
            let line = std::str::from_utf8(&buf[1..1 + pos])
                .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
            Ok(Some((line, 1 + pos + 2)))
        }
        None if buf.len() >= MAX_INLINE_SIZE + 3 => Err(ParseError::MessageTooLarge {
            size: buf.len(),
            max: MAX_INLINE_SIZE,
        }),
        None => Ok(None),
    }
}

fn parse_int(s: &str) -> ParseResult<i64> {
    s.parse()
        .map_err(|e: ParseIntError| ParseError::InvalidInteger(format!("{:?}: {}", s, e)))
}

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Helper function to parse a single RESP message from bytes.
pub fn parse_message(buf: &[u8]) -> ParseResult<Option<(RespValue, usize)>> {
    RespParser::new().parse(buf)
}
