//! WebSocket listener
//!
//! This module accepts connections and spawns one session per client:
//! - GET / - Streaming recognition over WebSocket (also GET /ws)
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Serve connections on `listener` until `state.shutdown` is cancelled
///
/// Upgraded sessions outlive the HTTP server; await `state.sessions` to
/// let them finish their teardown.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!("Server listening on {}", addr);

    let shutdown = state.shutdown.clone();
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server error")
}
