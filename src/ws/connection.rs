//! WebSocket upgrade, per-connection state, and the read/write loops.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::User,
    repositories::chat as chat_repo,
    services::auth as auth_service,
    state::AppState,
};

use super::events::{AckPayload, ClientEvent, ServerEvent};

/// Outbound event buffer per connection. A client that falls this far
/// behind starts dropping events and is eventually evicted by the broker.
const OUTBOUND_BUFFER: usize = 256;

/// The result of handing an event to a connection's outbound channel.
pub enum SendOutcome {
    /// Queued for delivery.
    Delivered,
    /// Channel full; the event was dropped for this connection.
    Lagging,
    /// The connection's write side is gone.
    Disconnected,
}

/// One live WebSocket connection, authenticated as a single user.
pub struct ClientConnection {
    /// Opaque connection identifier.
    pub id: String,
    /// The authenticated user.
    pub user_id: Uuid,
    tx: mpsc::Sender<Arc<String>>,
    joined: Mutex<HashSet<Uuid>>,
    drops: AtomicU64,
}

impl ClientConnection {
    pub fn new(id: String, user_id: Uuid, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            user_id,
            tx,
            joined: Mutex::new(HashSet::new()),
            drops: AtomicU64::new(0),
        }
    }

    /// Queue a serialized event without blocking the broadcaster.
    pub fn send(&self, payload: Arc<String>) -> SendOutcome {
        match self.tx.try_send(payload) {
            Ok(()) => SendOutcome::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.drops.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Lagging
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Disconnected,
        }
    }

    /// Lifetime count of dropped events for this connection.
    pub fn drop_count(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }

    pub(super) fn track_join(&self, chat_id: Uuid) {
        self.joined.lock().expect("joined set poisoned").insert(chat_id);
    }

    pub(super) fn track_leave(&self, chat_id: Uuid) {
        self.joined.lock().expect("joined set poisoned").remove(&chat_id);
    }

    /// Drain the joined-room set for disconnect cleanup.
    pub(super) fn take_joined(&self) -> HashSet<Uuid> {
        std::mem::take(&mut *self.joined.lock().expect("joined set poisoned"))
    }
}

/// Query parameters accepted on the upgrade request. Browsers cannot set
/// headers on WebSocket handshakes, so the token may ride in the URL.
#[derive(Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Authenticates the handshake and upgrades to a WebSocket. Connections
/// without a valid session credential are refused before the upgrade.
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<WsAuthQuery>,
) -> Result<Response> {
    let token = bearer_token(&headers)
        .or(query.token)
        .ok_or_else(|| AppError::Authentication("Missing credentials".to_string()))?;

    let (user, _session) = auth_service::resolve_session(&state.db, &token).await?;

    tracing::debug!(user_id = %user.id, "websocket authenticated");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user: User) {
    let conn_id = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::channel::<Arc<String>>(OUTBOUND_BUFFER);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), user.id, tx));

    tracing::info!(conn_id = %conn_id, user_id = %user.id, "websocket connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let frame = Message::Text(payload.as_str().to_owned().into());
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_client_event(&state, &connection, text.as_str()).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            // Ping/pong are answered by the protocol layer.
            Ok(_) => {}
        }
    }

    // The membership map is the sole authority for delivery: a dropped
    // transport must never leave the connection logically in a room.
    state.broker.leave_all(&connection).await;
    writer.abort();
    tracing::info!(conn_id = %conn_id, user_id = %user.id, "websocket disconnected");
}

async fn handle_client_event(state: &AppState, connection: &Arc<ClientConnection>, raw: &str) {
    let event: ClientEvent = match sonic_rs::from_str(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(conn_id = %connection.id, error = %e, "unparseable client event");
            send_ack(connection, AckPayload::error("unknown", "Unrecognized event"));
            return;
        }
    };

    match event {
        ClientEvent::Join { chat_id } => {
            match authorize_chat(state, connection.user_id, chat_id).await {
                Ok(()) => {
                    state.broker.join(connection, chat_id).await;
                    send_ack(connection, AckPayload::success("join", chat_id));
                }
                Err(reason) => {
                    tracing::warn!(conn_id = %connection.id, %chat_id, reason, "join refused");
                    send_ack(connection, AckPayload::error("join", reason));
                }
            }
        }
        ClientEvent::Leave { chat_id } => {
            state.broker.leave(connection, chat_id).await;
            send_ack(connection, AckPayload::success("leave", chat_id));
        }
    }
}

/// A join is only honored for chats the connection's user owns.
async fn authorize_chat(
    state: &AppState,
    user_id: Uuid,
    chat_id: Uuid,
) -> std::result::Result<(), &'static str> {
    match chat_repo::find_by_id(&state.db, &chat_id).await {
        Ok(Some(chat)) if chat.user_id == user_id => Ok(()),
        Ok(Some(_)) => Err("You do not have permission to access this chat"),
        Ok(None) => Err("Chat not found"),
        Err(e) => {
            tracing::error!(%chat_id, error = %e, "chat lookup failed");
            Err("Chat lookup failed")
        }
    }
}

fn send_ack(connection: &ClientConnection, ack: AckPayload) {
    if let Ok(json) = sonic_rs::to_string(&ServerEvent::Ack(ack)) {
        // Best effort; a full or closed channel is handled by the broker.
        let _ = connection.send(Arc::new(json));
    }
}
