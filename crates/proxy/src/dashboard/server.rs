//! axum web server for the dashboard.
//!
//! JSON endpoints under `/api` and a WebSocket at `/ws` that pushes the
//! status snapshot every second.

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::state::ProxyState;

pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/sessions", get(sessions))
        .route("/api/sessions/:uuid/transfer/:server", post(transfer))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Start the dashboard web server. Runs until the listener fails.
pub async fn start(state: Arc<ProxyState>, port: u16) {
    let addr = format!("0.0.0.0:{}", port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Dashboard failed to bind to {}: {}", addr, e);
            return;
        }
    };
    tracing::info!("Dashboard listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, router(state)).await {
        tracing::error!("Dashboard server error: {}", e);
    }
}

async fn status(State(state): State<Arc<ProxyState>>) -> Json<super::StatusSnapshot> {
    Json(super::status(&state))
}

async fn sessions(State(state): State<Arc<ProxyState>>) -> Json<Vec<super::SessionSummary>> {
    Json(super::sessions(&state))
}

/// Move a session to another configured server.
async fn transfer(
    State(state): State<Arc<ProxyState>>,
    Path((uuid, server)): Path<(Uuid, String)>,
) -> Response {
    let Some(session) = state.registry.get(&uuid) else {
        return error(StatusCode::NOT_FOUND, format!("no session {uuid}"));
    };
    let Some(target) = state.servers.get(&server) else {
        return error(StatusCode::NOT_FOUND, format!("no server {server:?}"));
    };

    match state.transfer(&session, target).await {
        Ok(()) => Json(serde_json::json!({ "transferred": true, "server": server })).into_response(),
        Err(e) => error(StatusCode::CONFLICT, e.to_string()),
    }
}

fn error(code: StatusCode, message: String) -> Response {
    (code, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ProxyState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Push status snapshots to a connected browser.
async fn handle_socket(mut socket: WebSocket, state: Arc<ProxyState>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let msg = serde_json::json!({
                    "type": "status",
                    "data": super::status(&state),
                });
                if send_json(&mut socket, &msg).await.is_err() {
                    break;
                }
            }

            // Drain any incoming messages (ping/pong, close).
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }
}

async fn send_json(socket: &mut WebSocket, value: &serde_json::Value) -> Result<(), ()> {
    let text = value.to_string();
    socket.send(Message::Text(text.into())).await.map_err(|_| ())
}
