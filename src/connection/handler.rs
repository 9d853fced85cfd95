//! Connection Handler Module
//!
//! This module handles individual client connections.
//! Each client gets its own task that runs in a loop,
//! reading commands and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned with a fresh RespDecoder
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes into decoder │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Drain complete commands │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute each in order,  │ │
//!    │  │ queue its reply         │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Flush replies           │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / QUIT / error
//!        │
//!        ▼
//! 5. Handler task ends, decoder state is dropped
//! ```
//!
//! ## Ordering
//!
//! Each command's handler is awaited before the next one starts, so replies
//! leave in the order the commands arrived, pipelined or not. A bad inline
//! line or a well-framed non-command gets `-ERR invalid command format` in
//! its slot and the connection stays open. A broken RESP frame gets the
//! same reply, after which the connection is closed.

use crate::commands::CommandHandler;
use crate::protocol::parser::{ParseError, MAX_BULK_SIZE};
use crate::protocol::{Command, RespDecoder, RespValue};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Maximum bytes buffered for one incomplete request
const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + 64 * 1024;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Whether the connection should keep going after a batch of commands.
enum Flow {
    Continue,
    Quit,
}

/// Handles a single client connection.
pub struct ConnectionHandler {
    /// The TCP stream, with replies buffered until a batch is done
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Per-connection protocol state
    decoder: RespDecoder,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            decoder: RespDecoder::new(),
            command_handler,
            stats,
        }
    }

    /// Runs the connection until the client leaves or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    info!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            self.read_more_data().await?;

            let flow = self.process_buffered().await?;
            self.stream.flush().await?;

            if let Flow::Quit = flow {
                return Ok(());
            }
        }
    }

    /// Executes every complete command in the buffer, in arrival order.
    async fn process_buffered(&mut self) -> Result<Flow, ConnectionError> {
        let batch = self.decoder.drain();
        let desynced = self.decoder.is_desynced();
        let last = batch.len();

        for (i, decoded) in batch.into_iter().enumerate() {
            let command = match decoded {
                Ok(command) => command,
                Err(e) => {
                    warn!(client = %self.addr, error = %e, "Parse error");
                    self.send_response(&RespValue::err(ParseError::InvalidCommand))
                        .await?;
                    // The decoder stops at a broken frame, so it is the last entry.
                    if desynced && i + 1 == last {
                        warn!(client = %self.addr, "Protocol desync, closing connection");
                        return Ok(Flow::Quit);
                    }
                    continue;
                }
            };

            trace!(client = %self.addr, command = %command.name, args = command.arity(), "Executing");
            let response = self.command_handler.execute(&command).await;
            self.stats.command_processed();
            self.send_response(&response).await?;

            if is_quit(&command, &response) {
                return Ok(Flow::Quit);
            }
        }

        Ok(Flow::Continue)
    }

    /// Reads more data from the socket into the decoder's buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.decoder.buffered() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.decoder.buffered(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        let buffer = self.decoder.buffer_mut();
        if buffer.capacity() - buffer.len() < 1024 {
            buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(buffer).await?;

        if n == 0 {
            if self.decoder.buffered() == 0 {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial command in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Queues a response; it is sent when the current batch is flushed.
    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Queued response"
        );
        Ok(())
    }
}

fn is_quit(command: &Command, response: &RespValue) -> bool {
    command.name == "QUIT" && !response.is_error()
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial command)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection.
///
/// Creates a [`ConnectionHandler`] and runs it to completion.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}
