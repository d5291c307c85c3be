use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{ClientEvent, ServerEvent, UserRow};
use crate::services::auth_service;
use crate::ws::session::RoomSession;
use crate::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Realtime connection endpoint.
///
/// The handshake credential is resolved to an active user BEFORE the
/// upgrade; a rejected handshake answers 401 and no session ever exists for
/// that peer. The resolved identity is fixed for the connection's lifetime.
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = auth_service::bearer_token(&headers, query.token.as_deref()) else {
        return (StatusCode::UNAUTHORIZED, "Authentication token required").into_response();
    };

    let user = match auth_service::authenticate(state.registry.as_ref(), &token).await {
        Ok(user) => user,
        Err(e) => {
            warn!("WebSocket handshake rejected: {}", e);
            return (StatusCode::UNAUTHORIZED, "Authentication failed").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_session(socket, user, state))
}

/// Drive one authenticated connection until it hangs up.
async fn run_session(socket: WebSocket, user: UserRow, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!("User {} connected: {}", user.username, connection_id);

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Single writer task: direct replies and room broadcasts both funnel
    // through this queue, so socket writes never interleave.
    let mut writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to serialize outbound event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    state.presence.register(connection_id, user.id, tx.clone());

    let mut session = RoomSession::new(
        connection_id,
        user,
        state.registry.clone(),
        state.cache.clone(),
        state.groups.clone(),
        tx,
    );

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Ping/pong are handled by the transport; binary is not part of
            // the contract.
            _ => continue,
        };

        let event: ClientEvent = match serde_json::from_str(&text) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    "Connection {} sent an unparseable event: {}",
                    connection_id, e
                );
                session.send_error("Invalid event payload");
                continue;
            }
        };

        session.handle_event(event).await;
    }

    // Whatever room the connection was in, run the leave sequence for it.
    session.handle_disconnect().await;
    let username = session.user().username.clone();
    state.presence.unregister(connection_id);
    drop(session);
    writer.abort();
    let _ = (&mut writer).await;

    info!("User {} disconnected: {}", username, connection_id);
}
