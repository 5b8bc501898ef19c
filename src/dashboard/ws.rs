use axum::{
    extract::{
        State,
        ws::{Message as WsFrame, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::access;
use super::api::extract::ApiQuery;
use super::api::{ApiError, SharedState};
use super::models::*;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── WebSocket message types ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    TaskCreated { task: Task },
    TaskUpdated { task: Task },
    TaskDeleted { task_id: i64 },
    CommentAdded { comment: Comment },
    FeedMessage { message: Message },
    TaskRequestUpdated { request: TaskRequest },
    ResourceRequestUpdated { request: ResourceRequest },
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Browsers cannot set headers on a WebSocket handshake, so the session
/// token arrives as `?token=`. Only staff accounts may subscribe.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    ApiQuery(params): ApiQuery<WsParams>,
) -> Result<Response, ApiError> {
    let token = params.token.ok_or(ApiError::Unauthorized(
        "Missing session token".to_string(),
    ))?;
    let principal = state
        .db
        .call(move |db| db.session_principal(&token))
        .await?
        .ok_or(ApiError::Unauthorized(
            "Session expired or invalid".to_string(),
        ))?;
    access::require_staff(&principal)?;

    tracing::debug!(user = principal.name(), "websocket subscriber connected");
    let rx = state.ws_tx.subscribe();
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, rx))
        .into_response())
}

async fn handle_socket(socket: WebSocket, rx: broadcast::Receiver<String>) {
    let (sender, receiver) = socket.split();
    run_socket_loop(sender, receiver, rx).await;
}

/// Forward broadcast events to one client, with keepalive. If no Pong is
/// received within [`PONG_TIMEOUT`] after a Ping is sent, the connection
/// is dropped.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, WsFrame>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<String>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // first tick completes immediately
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::debug!("websocket pong timeout, closing");
                    break;
                }
                if sender.send(WsFrame::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(WsFrame::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "websocket subscriber lagged");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(WsFrame::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(WsFrame::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    let _ = sender.send(WsFrame::Close(None)).await;
}

/// Serialize and broadcast a WsMessage to all connected WebSocket clients.
/// Returns silently even if no clients are connected.
pub fn broadcast_message(tx: &broadcast::Sender<String>, msg: &WsMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize websocket message");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
