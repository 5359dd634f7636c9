//! Chat socket (`/ws/chat`)
//!
//! Connecting establishes the user's personal room (`user:<id>`) and
//! announces them online. Conversation rooms are joined explicitly.

use crate::auth::SocketAuth;
use crate::chat::service;
use crate::realtime::hub::{conversation_room, user_room};
use crate::realtime::{Envelope, RoomSubscriptions};
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

pub async fn chat_socket(
    State(state): State<AppState>,
    SocketAuth(user): SocketAuth,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, user, socket))
}

async fn handle_socket(state: AppState, user: crate::auth::AuthenticatedUser, socket: WebSocket) {
    let socket_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Envelope>();

    let writer = tokio::spawn(async move {
        while let Some(envelope) = out_rx.recv().await {
            if sink
                .send(Message::Text(envelope.to_json().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let mut subs = RoomSubscriptions::new(state.hub.clone(), user.user_id, socket_id, out_tx);
    subs.join(&user_room(user.user_id)).await;

    broadcast_presence(&state, user.user_id, "user_online").await;
    tracing::info!(user_id = %user.user_id, "chat socket connected");

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let envelope = match Envelope::parse(&text) {
            Ok(envelope) => envelope,
            Err(e) => {
                subs.send_self(Envelope::error(format!("malformed frame: {e}")));
                continue;
            }
        };

        match envelope.event.as_str() {
            "join_conversation" => {
                if let Some(conversation_id) = conversation_id_from(&envelope.data) {
                    subs.join(&conversation_room(conversation_id)).await;
                }
            }
            "leave_conversation" => {
                if let Some(conversation_id) = conversation_id_from(&envelope.data) {
                    subs.leave(&conversation_room(conversation_id)).await;
                }
            }
            "send_message" => {
                handle_send(&state, &user, &mut subs, &envelope.data).await;
            }
            "mark_read" => {
                if let Some(conversation_id) = conversation_id_from(&envelope.data) {
                    if let Some(pool) = &state.db_pool {
                        if let Err(e) =
                            service::mark_read(pool, &state.hub, conversation_id, user.user_id).await
                        {
                            subs.send_self(Envelope::error(e.message()));
                        }
                    }
                }
            }
            "get_online_users" => {
                let online: Vec<String> = state
                    .hub
                    .online_users()
                    .await
                    .into_iter()
                    .map(|id| id.to_string())
                    .collect();
                subs.send_self(Envelope::new("online_users", json!({ "users": online })));
            }
            other => {
                subs.send_self(Envelope::error(format!("unknown event: {other}")));
            }
        }
    }

    subs.leave_all().await;
    broadcast_presence(&state, user.user_id, "user_offline").await;
    writer.abort();
    tracing::info!(user_id = %user.user_id, "chat socket disconnected");
}

fn conversation_id_from(data: &Value) -> Option<Uuid> {
    data.get("conversationId")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Announce presence to every other connected user's personal room.
async fn broadcast_presence(state: &AppState, user_id: Uuid, event: &str) {
    for online in state.hub.online_users().await {
        if online != user_id {
            state
                .hub
                .send(
                    &user_room(online),
                    Envelope::new(event, json!({ "userId": user_id.to_string() })),
                )
                .await;
        }
    }
}

async fn handle_send(
    state: &AppState,
    user: &crate::auth::AuthenticatedUser,
    subs: &mut RoomSubscriptions,
    data: &Value,
) {
    let Some(conversation_id) = conversation_id_from(data) else {
        subs.send_self(Envelope::error("send_message requires conversationId"));
        return;
    };
    let Some(content) = data.get("content").and_then(|v| v.as_str()) else {
        subs.send_self(Envelope::error("send_message requires content"));
        return;
    };
    let Some(pool) = &state.db_pool else {
        subs.send_self(Envelope::error("store unavailable"));
        return;
    };

    let kind = data.get("type").and_then(|v| v.as_str()).unwrap_or("text");
    let metadata = data.get("metadata").filter(|v| !v.is_null());

    if let Err(e) = service::send_message(
        pool,
        &state.hub,
        conversation_id,
        user.user_id,
        content,
        kind,
        metadata,
    )
    .await
    {
        subs.send_self(Envelope::error(e.message()));
    }
}
