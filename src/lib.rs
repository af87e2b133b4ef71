//! # respkv - A Small In-Memory Key-Value Server
//!
//! respkv speaks the Redis serialization protocol (RESP) over TCP and keeps
//! a single shared map of binary-safe keys to binary-safe values. Any Redis
//! client (`redis-cli`, client libraries) can talk to it for the commands it
//! supports.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              respkv                              │
//! │                                                                  │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐           │
//! │  │   Server    │───>│ Connection  │───>│  Command    │           │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │           │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘           │
//! │                            │                  │                  │
//! │                            ▼                  ▼                  │
//! │                     ┌─────────────┐    ┌──────────────────────┐  │
//! │                     │    RESP     │    │    StorageEngine     │  │
//! │                     │   Parser    │    │ ┌──────┐ ┌──────┐    │  │
//! │                     │ (streaming) │    │ │Shard0│ │...N  │    │  │
//! │                     └─────────────┘    │ └──────┘ └──────┘    │  │
//! │                                        └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use respkv::{Config, Server, StorageEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(StorageEngine::new());
//!     let server = Server::bind(&Config::default(), storage).await?;
//!
//!     server
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING` replies `PONG`
//! - `ECHO message [message ...]` replies with the message, or an array of them
//! - `SET key value`
//! - `GET key`
//! - `QUIT` replies `OK` and closes the connection
//! - `TEST` diagnostic, replies with the array `hello`, `world`
//!
//! Command names are case-insensitive.
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP value types and the streaming request decoder
//! - [`storage`]: Thread-safe sharded key-value store
//! - [`commands`]: Command table and dispatcher
//! - [`connection`]: Per-client read/decode/dispatch/reply loop
//! - [`server`]: TCP listener
//! - [`config`]: Command-line and environment configuration
//!
//! ## Protocol Limits
//!
//! Every connection enforces three limits (see [`ProtocolLimits`]): at most
//! 1024 arguments per request, at most 64 KiB per argument and at most 1 MiB
//! of unread input. Exceeding any of them gets the client a protocol error
//! and closes its connection; other clients are unaffected.

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, Response};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats, Disconnect};
pub use protocol::{ParseError, ProtocolLimits, RespParser, RespValue};
pub use server::{Server, ServerError};
pub use storage::{StorageEngine, StorageStats};

/// The default port respkv listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host respkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of respkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
