//! TCP accept loop.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Accepts connections forever, one task per client.
pub async fn accept_loop(listener: TcpListener, handler: CommandHandler, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Serves until `shutdown` resolves, then flushes and closes the active
/// backend.
pub async fn serve<F>(
    listener: TcpListener,
    handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let backends = Arc::clone(handler.backends());

    tokio::select! {
        _ = accept_loop(listener, handler, stats) => {}
        _ = shutdown => {
            info!("Shutdown signal received, stopping server...");
        }
    }

    if let Err(e) = backends.shutdown().await {
        warn!(error = %e, "Failed to close storage backend cleanly");
    }
}
