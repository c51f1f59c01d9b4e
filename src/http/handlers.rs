use super::state::AppState;
use crate::relay::RelaySession;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{error, info};

/// GET /stream
/// Upgrade to a WebSocket and hand the connection to a fresh relay session.
pub async fn stream(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream(socket, state.config))
}

async fn handle_stream(socket: WebSocket, config: Arc<crate::config::Config>) {
    let session = RelaySession::new(config);
    let session_id = session.id().to_string();

    info!("Accepted inbound connection, session {}", session_id);

    match session.run(socket).await {
        Ok(reason) => info!("Session {} finished: {:?}", session_id, reason),
        Err(e) => error!("Session {} failed: {:#}", session_id, e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
