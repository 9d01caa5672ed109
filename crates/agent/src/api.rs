//! Listener setup for the query and ingest surfaces

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

/// Bind a listener on all interfaces
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = format!("0.0.0.0:{}", port);
    TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))
}

/// Serve `app` until the listener fails
pub async fn serve(surface: &'static str, listener: TcpListener, app: Router) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(surface = surface, addr = %addr, "Starting API server");

    axum::serve(listener, app)
        .await
        .with_context(|| format!("{} server failed", surface))
}
