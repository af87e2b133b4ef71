//! Connection Handler Module
//!
//! This module handles individual client connections. Each client gets its
//! own task running the read-decode-dispatch-encode-write loop below.
//!
//! ## Connection Lifecycle
//!
//! ```text
//!  Open ──> AwaitCommand ──> Dispatch ──> Reply ──┐
//!               ▲                                 │
//!               └─────────────────────────────────┤
//!                                                 │ QUIT
//!  AwaitCommand ── framing error ──> error reply ─┤
//!  AwaitCommand ── EOF / I/O error ───────────────┤
//!  Reply ── write error ──────────────────────────┤
//!                                                 ▼
//!                                              Closed
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream protocol: one read may hold half a command or several.
//! Incoming bytes accumulate in a `BytesMut` buffer and every complete frame
//! in it is dispatched before the next read. Replies go through a
//! `BufWriter` that is flushed before the handler waits for more input, so
//! pipelined replies share a syscall but are never held back behind a read.

use crate::commands::CommandHandler;
use crate::protocol::{ParseError, ProtocolLimits, RespParser, RespValue};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Connections turned away by the connection limit
    pub connections_rejected: AtomicU64,
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

    pub fn connection_rejected(&self) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
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

/// Why a connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The client closed its side between commands
    ClientClosed,
    /// The client sent QUIT
    Quit,
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The client violated the protocol or a limit
    #[error("{0}")]
    ParseError(#[from] ParseError),

    /// The client closed its side in the middle of a command
    #[error("Unexpected end of stream")]
    UnexpectedEof,
}

/// Handles a single client connection.
///
/// Generic over the stream so the same loop runs over TCP in production and
/// over in-memory mocks in tests.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes received but not yet decoded
    buffer: BytesMut,

    command_handler: CommandHandler,

    parser: RespParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The byte stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `limits` - Framing limits for this connection
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        limits: ProtocolLimits,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: RespParser::new(limits),
            stats,
        }
    }

    /// Runs the connection until the client leaves, sends QUIT, or fails.
    pub async fn run(mut self) -> Result<Disconnect, ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(Disconnect::Quit) => info!(client = %self.addr, "Client quit"),
            Ok(Disconnect::ClientClosed) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<Disconnect, ConnectionError> {
        loop {
            while let Some(args) = self.next_command().await? {
                let response = self.command_handler.execute(&args);
                self.stats.command_processed();

                self.write_response(&response.reply).await?;

                if response.close {
                    self.stream.flush().await?;
                    return Ok(Disconnect::Quit);
                }
            }

            // Everything decodable has been answered; send it before waiting.
            self.stream.flush().await?;

            if let Some(disconnect) = self.read_more_data().await? {
                return Ok(disconnect);
            }
        }
    }

    /// Decodes the next buffered command, if a complete one is available.
    ///
    /// Framing errors are reported to the peer before being returned.
    async fn next_command(&mut self) -> Result<Option<Vec<Bytes>>, ConnectionError> {
        match self.parser.parse(&mut self.buffer) {
            Ok(Some(args)) => {
                trace!(
                    client = %self.addr,
                    argc = args.len(),
                    remaining = self.buffer.len(),
                    "Parsed command"
                );
                Ok(Some(args))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete command, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Protocol error");
                // Best effort: the peer may already be gone.
                let reply = RespValue::error(format!("ERR {}", e));
                if self.write_response(&reply).await.is_ok() {
                    let _ = self.stream.flush().await;
                }
                Err(ConnectionError::ParseError(e))
            }
        }
    }

    /// Reads more data from the stream into the buffer.
    ///
    /// Returns `Some` when the peer closed the stream cleanly.
    async fn read_more_data(&mut self) -> Result<Option<Disconnect>, ConnectionError> {
        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() && !self.parser.in_frame() {
                return Ok(Some(Disconnect::ClientClosed));
            }
            // Partial command in buffer
            return Err(ConnectionError::UnexpectedEof);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(None)
    }

    /// Encodes a reply into the write buffer.
    async fn write_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            reply = %response,
            "Queued response"
        );
        Ok(())
    }
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion, logging instead of returning errors.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    limits: ProtocolLimits,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, limits, stats);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use tokio_test::io::Builder;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn handler_for<S>(stream: S, limits: ProtocolLimits) -> (ConnectionHandler<S>, Arc<ConnectionStats>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());
        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            CommandHandler::new(storage),
            limits,
            Arc::clone(&stats),
        );
        (handler, stats)
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();
        let (handler, stats) = handler_for(mock, ProtocolLimits::default());

        assert_eq!(handler.run().await.unwrap(), Disconnect::ClientClosed);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_set_get_in_order() {
        let mock = Builder::new()
            .read(b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$4\r\nAriz\r\n")
            .write(b"+OK\r\n")
            .read(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
            .write(b"$4\r\nAriz\r\n")
            .read(b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n")
            .write(b"$-1\r\n")
            .build();
        let (handler, _) = handler_for(mock, ProtocolLimits::default());

        assert_eq!(handler.run().await.unwrap(), Disconnect::ClientClosed);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let mock = Builder::new()
            .read(b"*3\r\n$3\r\nSE")
            .read(b"T\r\n$5\r\nmyke")
            .read(b"y\r\n$7\r\nmyvalue\r\n")
            .write(b"+OK\r\n")
            .build();
        let (handler, _) = handler_for(mock, ProtocolLimits::default());

        assert_eq!(handler.run().await.unwrap(), Disconnect::ClientClosed);
    }

    #[tokio::test]
    async fn test_pipelined_commands_reply_in_order() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n*1\r\n$4\r\nTEST\r\n")
            .write(b"+PONG\r\n$2\r\nhi\r\n*2\r\n+hello\r\n+world\r\n")
            .build();
        let (handler, stats) = handler_for(mock, ProtocolLimits::default());

        assert_eq!(handler.run().await.unwrap(), Disconnect::ClientClosed);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_command_errors_keep_connection_open() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nECHO\r\n")
            .write(b"-ERR wrong number of arguments for 'echo' command\r\n")
            .read(b"*1\r\n$3\r\nFOO\r\n")
            .write(b"-ERR unknown command 'FOO'\r\n")
            .read(b"*1\r\n$4\r\nping\r\n")
            .write(b"+PONG\r\n")
            .build();
        let (handler, _) = handler_for(mock, ProtocolLimits::default());

        assert_eq!(handler.run().await.unwrap(), Disconnect::ClientClosed);
    }

    #[tokio::test]
    async fn test_quit_stops_processing() {
        // The PING after QUIT must never be answered.
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nQUIT\r\n*1\r\n$4\r\nPING\r\n")
            .write(b"+OK\r\n")
            .build();
        let (handler, stats) = handler_for(mock, ProtocolLimits::default());

        assert_eq!(handler.run().await.unwrap(), Disconnect::Quit);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_protocol_error_is_reported_then_closes() {
        let mock = Builder::new()
            .read(b"*1\r\n+PING\r\n")
            .write(b"-ERR Protocol error: expected '$', got '+'\r\n")
            .build();
        let (handler, _) = handler_for(mock, ProtocolLimits::default());

        let result = handler.run().await;
        assert!(matches!(
            result,
            Err(ConnectionError::ParseError(ParseError::ExpectedBulk('+')))
        ));
    }

    #[tokio::test]
    async fn test_protocol_error_reply_stays_on_one_line() {
        let mock = Builder::new()
            .read(b"\n")
            .write(b"-ERR Protocol error: expected '*', got ' '\r\n")
            .build();
        let (handler, _) = handler_for(mock, ProtocolLimits::default());

        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::ParseError(ParseError::ExpectedArray('\n')))
        ));
    }

    #[tokio::test]
    async fn test_multibulk_limit_closes_connection() {
        let limits = ProtocolLimits {
            max_multibulk_len: 2,
            ..ProtocolLimits::default()
        };
        let mock = Builder::new()
            .read(b"*2\r\n$4\r\nECHO\r\n$1\r\na\r\n*3\r\n")
            .write(b"$1\r\na\r\n-ERR Protocol error: invalid multibulk length\r\n")
            .build();
        let (handler, _) = handler_for(mock, limits);

        let result = handler.run().await;
        assert!(matches!(
            result,
            Err(ConnectionError::ParseError(ParseError::InvalidMultibulkLength))
        ));
    }

    #[tokio::test]
    async fn test_bulk_limit_closes_connection() {
        let mock = Builder::new()
            .read(b"*2\r\n$3\r\nGET\r\n$65537\r\n")
            .write(b"-ERR Protocol error: invalid bulk length\r\n")
            .build();
        let (handler, _) = handler_for(mock, ProtocolLimits::default());

        assert!(handler.run().await.is_err());
    }

    #[tokio::test]
    async fn test_eof_mid_frame() {
        let mock = Builder::new().read(b"*2\r\n$3\r\nGET\r\n").build();
        let (handler, stats) = handler_for(mock, ProtocolLimits::default());

        let result = handler.run().await;
        assert!(matches!(result, Err(ConnectionError::UnexpectedEof)));
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_read_error_closes_connection() {
        let mock = Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let (handler, _) = handler_for(mock, ProtocolLimits::default());

        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::IoError(_))
        ));
    }

    #[tokio::test]
    async fn test_write_error_closes_connection() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n")
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "gone",
            ))
            .build();
        let (handler, _) = handler_for(mock, ProtocolLimits::default());

        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::IoError(_))
        ));
    }

    #[tokio::test]
    async fn test_connections_share_only_the_store() {
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());

        let writer = Builder::new()
            .read(b"*3\r\n$3\r\nset\r\n$1\r\nk\r\n$1\r\nv\r\n")
            .write(b"+OK\r\n")
            .build();
        handle_connection(
            writer,
            test_addr(),
            CommandHandler::new(Arc::clone(&storage)),
            ProtocolLimits::default(),
            Arc::clone(&stats),
        )
        .await;

        let reader = Builder::new()
            .read(b"*2\r\n$3\r\nget\r\n$1\r\nk\r\n")
            .write(b"$1\r\nv\r\n")
            .build();
        handle_connection(
            reader,
            test_addr(),
            CommandHandler::new(Arc::clone(&storage)),
            ProtocolLimits::default(),
            Arc::clone(&stats),
        )
        .await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 2);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
    }
}
