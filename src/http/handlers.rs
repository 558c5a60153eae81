use super::state::AppState;
use crate::session::Session;
use crate::transport::WsTransport;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info, warn};

/// GET / (WebSocket upgrade)
/// Open a streaming recognition session
pub async fn recognize(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let permit = match state.try_admit() {
        Ok(permit) => permit,
        Err(()) => {
            warn!(
                "Rejecting connection from {}: {} sessions active",
                peer,
                state.active_sessions()
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    let tracker = state.sessions.clone();
    ws.on_upgrade(move |socket| tracker.track_future(run_session(socket, peer, state, permit)))
}

/// Drive one session to completion; the admission permit is held until it ends
async fn run_session(
    socket: WebSocket,
    peer: SocketAddr,
    state: AppState,
    permit: Option<OwnedSemaphorePermit>,
) {
    let session = Session::new(
        WsTransport::new(socket, peer),
        state.model.clone(),
        state.dispatcher.clone(),
        state.session_config.as_ref().clone(),
    )
    .with_shutdown(state.shutdown.child_token());

    let active = state.session_started();
    debug!("Session {} started, {} active", session.id(), active);

    let stats = session.run().await;

    let active = state.session_finished();
    drop(permit);

    match serde_json::to_string(&stats) {
        Ok(json) => info!("Session summary: {}", json),
        Err(e) => warn!("Failed to serialize session stats: {}", e),
    }
    debug!("{} sessions still active", active);
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
