//! Per-client connection handling.
//!
//! Each accepted socket gets its own task running a
//! [`ConnectionHandler`]: read bytes into a buffer, parse one RESP
//! frame, execute it, write the reply, repeat. Because parsing drains
//! the buffer frame by frame before the next read, pipelined requests
//! arriving in one TCP segment are answered in order.
//!
//! Reads carry a 30-second deadline. The deadline exists only so an
//! idle connection periodically re-checks the server shutdown signal;
//! hitting it keeps the connection alive. EOF ends the session
//! cleanly, and a protocol error produces a single `-ERR` reply
//! before the connection is dropped.

use crate::commands::CommandHandler;
use crate::protocol::parser::MAX_BULK_SIZE;
use crate::protocol::{command_from_value, ParseError, RespParser, RespValue};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

/// How long one read may block before the loop re-checks shutdown.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Initial read-buffer capacity.
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Upper bound on buffered request bytes; sized so the largest legal
/// bulk string still fits with framing headroom.
const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + 16 * 1024;

/// Shared registry of live connections and traffic counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connections_accepted: AtomicU64,
    pub active_connections: AtomicU64,
    pub commands_processed: AtomicU64,
    pub bytes_read: AtomicU64,
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
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// State for one client connection.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    command_handler: CommandHandler,
    parser: RespParser,
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
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: RespParser::new(),
            stats,
        }
    }

    /// Runs the connection until the client goes away, the protocol
    /// is violated, or the server shuts down.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "client connected");

        let result = self.main_loop(&mut shutdown).await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "connection closed"),
            Err(ConnectionError::ClientDisconnected) => {
                debug!(client = %self.addr, "client disconnected")
            }
            Err(ConnectionError::ParseError(e)) => {
                // One error reply, then the connection is abandoned;
                // after a framing error the stream cannot be trusted.
                warn!(client = %self.addr, error = %e, "protocol error");
                let reply = RespValue::error(format!("ERR {}", e));
                let _ = self.send_response(&reply).await;
            }
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "connection error"),
        }

        self.stats.connection_closed();
        result
    }

    async fn main_loop(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ConnectionError> {
        loop {
            // Answer everything already buffered (pipelining).
            while let Some(args) = self.try_parse_command()? {
                let response = self.command_handler.execute(&args);
                self.stats.command_processed();
                self.send_response(&response).await?;
            }

            tokio::select! {
                read = tokio::time::timeout(READ_TIMEOUT, self.read_more_data()) => {
                    match read {
                        Ok(result) => result?,
                        // Deadline passed with no request; keep waiting.
                        Err(_) => continue,
                    }
                }
                _ = shutdown.recv() => {
                    debug!(client = %self.addr, "closing for server shutdown");
                    return Ok(());
                }
            }
        }
    }

    /// Takes one complete command off the front of the buffer.
    fn try_parse_command(&mut self) -> Result<Option<Vec<Bytes>>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer) {
            Ok(Some((frame, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed,
                    remaining = self.buffer.len(),
                    "parsed frame"
                );
                Ok(Some(command_from_value(frame)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ConnectionError::ParseError(e)),
        }
    }

    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(client = %self.addr, size = self.buffer.len(), "read buffer limit exceeded");
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            }
            return Err(ConnectionError::UnexpectedEof);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "read data");
        Ok(())
    }

    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        Ok(())
    }
}

/// Errors ending a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("parse error: {0}")]
    ParseError(#[from] ParseError),

    /// The client closed its end between requests.
    #[error("client disconnected")]
    ClientDisconnected,

    /// The client closed its end mid-frame.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("read buffer limit exceeded")]
    BufferFull,
}

/// Creates and runs a [`ConnectionHandler`] to completion. Expected
/// endings (clean disconnect, reset) are not treated as failures.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: broadcast::Receiver<()>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run(shutdown).await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "connection ended with error");
            }
        }
    }
}
