//! TCP listener.
//!
//! Accepts connections and spawns one `ConnectionHandler` task per client.
//! Per-connection failures are logged and never stop the listener; a failing
//! `accept()` means the listening socket itself is unusable and ends `run`
//! with an error.

use crate::commands::CommandHandler;
use crate::config::Config;
use crate::connection::{handle_connection, ConnectionStats};
use crate::protocol::{ProtocolLimits, RespValue};
use crate::storage::StorageEngine;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Errors that stop the listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

/// A bound listener plus everything its connections share.
pub struct Server {
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    limits: ProtocolLimits,
    /// Permits for concurrent connections, if capped
    connection_limit: Option<Arc<Semaphore>>,
}

impl Server {
    /// Wraps an already bound listener with default limits and no cap.
    pub fn new(listener: TcpListener, storage: Arc<StorageEngine>) -> Self {
        Self {
            listener,
            storage,
            stats: Arc::new(ConnectionStats::new()),
            limits: ProtocolLimits::default(),
            connection_limit: None,
        }
    }

    /// Binds the configured address and applies the configured limits.
    pub async fn bind(config: &Config, storage: Arc<StorageEngine>) -> Result<Self, ServerError> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let server = Self::new(listener, storage).with_limits(config.limits());
        Ok(match config.max_connections {
            Some(max) => server.with_max_connections(max),
            None => server,
        })
    }

    pub fn with_limits(mut self, limits: ProtocolLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Caps the number of simultaneous clients.
    ///
    /// Values above `Semaphore::MAX_PERMITS` are clamped to it.
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        let permits = max_connections.min(Semaphore::MAX_PERMITS);
        self.connection_limit = Some(Arc::new(Semaphore::new(permits)));
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn storage(&self) -> Arc<StorageEngine> {
        Arc::clone(&self.storage)
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accepts connections until `shutdown` completes or `accept()` fails.
    ///
    /// Connections already running are not interrupted by shutdown.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);

        loop {
            let (stream, addr) = tokio::select! {
                accepted = self.listener.accept() => accepted.map_err(|e| {
                    error!(error = %e, "Failed to accept connection");
                    ServerError::Accept(e)
                })?,
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            };

            let permit = match &self.connection_limit {
                Some(limit) => match Arc::clone(limit).try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        warn!(client = %addr, "Rejecting connection: max number of clients reached");
                        self.stats.connection_rejected();
                        tokio::spawn(reject(stream));
                        continue;
                    }
                },
                None => None,
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
            }

            let handler = CommandHandler::new(Arc::clone(&self.storage));
            let stats = Arc::clone(&self.stats);
            let limits = self.limits;

            // Spawn a task to handle this connection
            tokio::spawn(async move {
                let _permit = permit;
                handle_connection(stream, addr, handler, limits, stats).await;
            });
        }
    }
}

/// Tells an over-limit client why it is being dropped.
async fn reject(mut stream: TcpStream) {
    let reply = RespValue::error("ERR max number of clients reached").serialize();
    if let Err(e) = stream.write_all(&reply).await {
        debug!(error = %e, "Failed to send rejection");
    }
}
