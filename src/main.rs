//! logkv - RESP key-value server with swappable log-based storage
//!
//! This is the main entry point for the server.
//! It parses configuration, opens the storage backend and serves
//! connections until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use logkv::commands::CommandHandler;
use logkv::config::Config;
use logkv::connection::ConnectionStats;
use logkv::server;
use logkv::storage::BackendManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
  _              _
 | | ___   __ _ | | ____   __
 | |/ _ \ / _` || |/ /\ \ / /
 | | (_) | (_| ||   <  \ V /
 |_|\___/ \__, ||_|\_\  \_/
          |___/

logkv v{} - RESP key-value server with swappable log-based storage
──────────────────────────────────────────────────────────────
Server started on {}
Backend: {}    Data dir: {}

Connect with: redis-cli -p {}
Use Ctrl+C to shutdown gracefully.
"#,
        logkv::VERSION,
        config.bind_address(),
        config.backend,
        config.data_dir.display(),
        config.port,
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // One backend, shared by every connection
    let backends = BackendManager::open(&config.data_dir, config.backend)
        .await
        .with_context(|| format!("failed to open backend '{}'", config.backend))?;
    let backends = Arc::new(backends);

    let stats = Arc::new(ConnectionStats::new());
    let handler = CommandHandler::new(backends, Arc::clone(&stats));

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    print_banner(&config);
    info!(
        address = %config.bind_address(),
        backend = %config.backend,
        data_dir = %config.data_dir.display(),
        "Listening"
    );

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    server::serve(listener, handler, stats, shutdown).await;

    info!("Server shutdown complete");
    Ok(())
}
