//! respkv server binary.
//!
//! Parses configuration, sets up logging, binds the listener and serves
//! until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use respkv::{Config, Server, StorageEngine};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
respkv v{} - In-Memory Key-Value Server
──────────────────────────────────────────────
Listening on {}
Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        respkv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level '{}'", config.log_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Create the storage engine (shared across all connections)
    let storage = Arc::new(StorageEngine::new());

    let server = Server::bind(&config, Arc::clone(&storage))
        .await
        .context("failed to start listener")?;
    let stats = server.stats();

    print_banner(&config);
    info!(
        address = %config.bind_address(),
        max_multibulk_len = config.max_multibulk_len,
        max_bulk_len = config.max_bulk_len,
        max_buffer_size = config.max_buffer_size,
        max_connections = ?config.max_connections,
        "Server started"
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    let result = server.run(shutdown).await;

    let storage_stats = storage.stats();
    info!(
        keys = storage_stats.keys,
        gets = storage_stats.gets,
        sets = storage_stats.sets,
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        rejected = stats.connections_rejected.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        "Server shutdown complete"
    );

    result.context("listener failed")
}
