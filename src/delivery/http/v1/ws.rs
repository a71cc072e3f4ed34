use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::usecase::jwt::TokenType;
use crate::usecase::notifications::ADMIN_ROOM;
use crate::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    token: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    // Validate JWT from query param
    let claims = match state.jwt_service.validate_token(&query.token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "WS connection rejected: invalid token");
            return Response::builder()
                .status(401)
                .body("Unauthorized".into())
                .unwrap();
        }
    };

    if claims.token_type != TokenType::Access {
        tracing::warn!("WS connection rejected: not an access token");
        return Response::builder()
            .status(401)
            .body("Unauthorized".into())
            .unwrap();
    }

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "WS connection rejected: bad subject");
            return Response::builder()
                .status(401)
                .body("Unauthorized".into())
                .unwrap();
        }
    };

    tracing::info!(user_id = %user_id, admin = claims.admin, "WS connection accepted, upgrading");

    let admin = claims.admin;
    ws.on_upgrade(move |socket| handle_socket(socket, user_id, admin, state))
}

async fn handle_socket(socket: WebSocket, user_id: Uuid, admin: bool, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut user_rx = state.push.subscribe_user(user_id).await;
    let mut admin_rx = if admin {
        Some(state.push.subscribe_room(ADMIN_ROOM).await)
    } else {
        None
    };

    tracing::info!(user_id = %user_id, admin, "WS client connected");

    loop {
        tokio::select! {
            msg = user_rx.recv() => {
                if !forward(&mut ws_sender, user_id, msg).await {
                    break;
                }
            }
            msg = recv_room(&mut admin_rx) => {
                if !forward(&mut ws_sender, user_id, msg).await {
                    break;
                }
            }
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(user_id = %user_id, "WS client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(user_id = %user_id, error = %e, "WS receive error");
                        break;
                    }
                    // Ignore other messages (Ping/Pong handled by axum, Text/Binary ignored)
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Cleanup: drop our receivers, then remove channels nobody listens to
    drop(user_rx);
    drop(admin_rx);
    state.push.release_user(user_id).await;
    if admin {
        state.push.release_room(ADMIN_ROOM).await;
    }
}

/// Pends forever when the client has no admin room subscription, so the
/// select loop only polls the branch for admins.
async fn recv_room(
    rx: &mut Option<broadcast::Receiver<String>>,
) -> Result<String, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Returns false when the socket is gone and the loop should stop.
async fn forward(
    ws_sender: &mut (impl SinkExt<Message> + Unpin),
    user_id: Uuid,
    msg: Result<String, broadcast::error::RecvError>,
) -> bool {
    match msg {
        Ok(payload) => {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                tracing::info!(user_id = %user_id, "WS send failed, client disconnected");
                return false;
            }
            true
        }
        Err(broadcast::error::RecvError::Lagged(n)) => {
            // Dropped events are fine: the client reconciles through the
            // unread-count endpoint.
            tracing::warn!(user_id = %user_id, lagged = n, "WS client lagged, some events were skipped");
            true
        }
        Err(broadcast::error::RecvError::Closed) => {
            tracing::debug!(user_id = %user_id, "push channel closed");
            false
        }
    }
}
