//! Document collaboration socket (`/ws/docs`)
//!
//! Envelope-dispatched events: `join_document`, `yjs_update`,
//! `cursor_update`, `get_presence`, `save_snapshot`, `leave_document`.
//! Errors go back to the offending client as `error {message}` frames;
//! only authentication failures close the socket.

use crate::auth::SocketAuth;
use crate::error::AppError;
use crate::realtime::envelope::{bytes_from_json, bytes_to_json};
use crate::realtime::{Envelope, RoomSubscriptions};
use crate::state::AppState;
use crate::versioning;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashSet;
use tokio::sync::mpsc;
use uuid::Uuid;

pub async fn docs_socket(
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
    let mut joined_docs: HashSet<Uuid> = HashSet::new();

    tracing::info!(user_id = %user.user_id, socket_id = %socket_id, "document socket connected");

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
            "join_document" => {
                handle_join(&state, &user, socket_id, &mut subs, &mut joined_docs, &envelope.data)
                    .await;
            }
            "yjs_update" => {
                handle_update(&state, &user, &mut subs, &envelope.data).await;
            }
            "cursor_update" => {
                handle_cursor(&state, socket_id, &mut subs, &envelope.data).await;
            }
            "get_presence" => {
                if let Some(document_id) = document_id_from(&envelope.data) {
                    let users = state.engine.presence(document_id).await;
                    subs.send_self(Envelope::new("presence_update", json!({ "users": users })));
                }
            }
            "save_snapshot" => {
                handle_save_snapshot(&state, &user, &mut subs, &envelope.data).await;
            }
            "leave_document" => {
                if let Some(document_id) = document_id_from(&envelope.data) {
                    leave_document(&state, &user, socket_id, &mut subs, document_id).await;
                    joined_docs.remove(&document_id);
                }
            }
            other => {
                subs.send_self(Envelope::error(format!("unknown event: {other}")));
            }
        }
    }

    // disconnect: run the leave protocol for every joined document,
    // which triggers the final save on the last participant out
    for document_id in joined_docs {
        leave_document(&state, &user, socket_id, &mut subs, document_id).await;
    }
    subs.leave_all().await;
    writer.abort();
    tracing::info!(user_id = %user.user_id, socket_id = %socket_id, "document socket disconnected");
}

fn document_id_from(data: &Value) -> Option<Uuid> {
    data.get("documentId")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

async fn handle_join(
    state: &AppState,
    user: &crate::auth::AuthenticatedUser,
    socket_id: Uuid,
    subs: &mut RoomSubscriptions,
    joined_docs: &mut HashSet<Uuid>,
    data: &Value,
) {
    let Some(document_id) = document_id_from(data) else {
        subs.send_self(Envelope::error("join_document requires documentId"));
        return;
    };

    match state
        .engine
        .join(document_id, user.user_id, &user.email, socket_id)
        .await
    {
        Ok(outcome) => {
            let room = document_id.to_string();
            subs.join(&room).await;
            joined_docs.insert(document_id);

            subs.send_self(Envelope::new(
                "document_joined",
                json!({
                    "documentId": document_id.to_string(),
                    "content": outcome.content,
                    "users": outcome.users,
                }),
            ));
            subs.send_self(Envelope::new("yjs_sync", bytes_to_json(&outcome.sync)));

            state
                .hub
                .send(
                    &room,
                    Envelope::new(
                        "user_joined",
                        json!({
                            "userId": user.user_id.to_string(),
                            "users": outcome.users,
                        }),
                    )
                    .excluding(socket_id),
                )
                .await;
        }
        Err(e) => {
            subs.send_self(Envelope::error(e.message()));
        }
    }
}

async fn handle_update(
    state: &AppState,
    user: &crate::auth::AuthenticatedUser,
    subs: &mut RoomSubscriptions,
    data: &Value,
) {
    let Some(document_id) = document_id_from(data) else {
        subs.send_self(Envelope::error("yjs_update requires documentId"));
        return;
    };
    let Some(update) = data.get("update").and_then(bytes_from_json) else {
        subs.send_self(Envelope::error("yjs_update requires update bytes"));
        return;
    };

    match state.engine.apply_update(document_id, user.user_id, &update).await {
        Ok(()) => {
            // fan the same opaque bytes out to everyone in the room,
            // sender included; clients dedupe by causal id
            state
                .hub
                .send(&document_id.to_string(), Envelope::new("yjs_update", data.clone()))
                .await;
        }
        Err(e) => {
            subs.send_self(Envelope::error(e.message()));
        }
    }
}

async fn handle_cursor(
    state: &AppState,
    socket_id: Uuid,
    subs: &mut RoomSubscriptions,
    data: &Value,
) {
    let Some(document_id) = document_id_from(data) else {
        return;
    };
    let cursor = data.get("cursor").cloned().unwrap_or(Value::Null);

    if state.engine.cursor_update(document_id, socket_id, cursor).await {
        state
            .hub
            .send(
                &document_id.to_string(),
                Envelope::new("cursor_updated", data.clone()).excluding(socket_id),
            )
            .await;
    } else {
        subs.send_self(Envelope::error("not joined to that document"));
    }
}

async fn handle_save_snapshot(
    state: &AppState,
    user: &crate::auth::AuthenticatedUser,
    subs: &mut RoomSubscriptions,
    data: &Value,
) {
    let Some(document_id) = document_id_from(data) else {
        subs.send_self(Envelope::error("save_snapshot requires documentId"));
        return;
    };
    let Some(pool) = state.engine.pool().cloned() else {
        subs.send_self(Envelope::error("store unavailable"));
        return;
    };

    let description = data.get("description").and_then(|v| v.as_str());

    // explicit content beats the room's buffered state
    let content = match data.get("content").and_then(|v| v.as_str()) {
        Some(content) => Some(content.to_string()),
        None => state.engine.current_content(document_id).await,
    };
    let Some(content) = content else {
        subs.send_self(Envelope::error("no content available to snapshot"));
        return;
    };

    if let Err(e) = crate::store::content::save_content(&pool, document_id, &content).await {
        subs.send_self(Envelope::error(AppError::from(e).message()));
        return;
    }

    // unlabeled snapshots get the canonical auto-save description
    let created = match description {
        Some(desc) => {
            versioning::create_version(&pool, document_id, &content, user.user_id, Some(desc)).await
        }
        None => versioning::create_auto_version(&pool, document_id, &content, user.user_id).await,
    };
    match created {
        Ok(snapshot) => {
            let retention = state.engine.config().version_retention;
            if let Err(e) = versioning::cleanup_old_versions(&pool, document_id, retention).await {
                tracing::warn!("version cleanup failed: {:?}", e);
            }
            subs.send_self(Envelope::new(
                "snapshot_saved",
                json!({
                    "documentId": document_id.to_string(),
                    "version": snapshot.version,
                    "versionId": snapshot.id.to_string(),
                }),
            ));
        }
        Err(e) => {
            subs.send_self(Envelope::error(e.message()));
        }
    }
}

async fn leave_document(
    state: &AppState,
    user: &crate::auth::AuthenticatedUser,
    socket_id: Uuid,
    subs: &mut RoomSubscriptions,
    document_id: Uuid,
) {
    let room = document_id.to_string();
    if let Some(_left) = state.engine.leave(document_id, socket_id).await {
        let users = state.engine.presence(document_id).await;
        state
            .hub
            .send(
                &room,
                Envelope::new(
                    "user_left",
                    json!({
                        "userId": user.user_id.to_string(),
                        "users": users,
                    }),
                )
                .excluding(socket_id),
            )
            .await;
    }
    subs.leave(&room).await;
}
