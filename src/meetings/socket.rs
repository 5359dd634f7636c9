//! Meeting socket (`/ws/meetings`)
//!
//! Presence mechanics without a CRDT: `join_meeting`, `leave_meeting`,
//! `send_message`. Messages are ephemeral, buffered to the last 200 in
//! memory.

use crate::auth::SocketAuth;
use crate::meetings::service;
use crate::realtime::hub::meeting_room;
use crate::realtime::{Envelope, RoomSubscriptions};
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashSet;
use tokio::sync::mpsc;
use uuid::Uuid;

pub async fn meetings_socket(
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
    let mut joined_rooms: HashSet<String> = HashSet::new();

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
            "join_meeting" => {
                handle_join(&state, &user, socket_id, &mut subs, &mut joined_rooms, &envelope.data)
                    .await;
            }
            "leave_meeting" => {
                if let Some(room_id) = room_id_from(&envelope.data) {
                    leave_meeting(&state, &user, socket_id, &mut subs, &room_id).await;
                    joined_rooms.remove(&room_id);
                }
            }
            "send_message" => {
                handle_message(&state, &user, &mut subs, &envelope.data).await;
            }
            other => {
                subs.send_self(Envelope::error(format!("unknown event: {other}")));
            }
        }
    }

    for room_id in joined_rooms.clone() {
        leave_meeting(&state, &user, socket_id, &mut subs, &room_id).await;
    }
    subs.leave_all().await;
    writer.abort();
}

fn room_id_from(data: &Value) -> Option<String> {
    data.get("meetingRoomId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn display_name(user: &crate::auth::AuthenticatedUser) -> String {
    user.email.clone()
}

async fn handle_join(
    state: &AppState,
    user: &crate::auth::AuthenticatedUser,
    socket_id: Uuid,
    subs: &mut RoomSubscriptions,
    joined_rooms: &mut HashSet<String>,
    data: &Value,
) {
    let Some(room_id) = room_id_from(data) else {
        subs.send_self(Envelope::error("join_meeting requires meetingRoomId"));
        return;
    };

    // roles are checked against the persisted meeting when the store is
    // up; a store-less server admits anyone (dev mode)
    let meeting = match &state.db_pool {
        Some(pool) => match service::authorize_join(pool, &room_id, user.user_id).await {
            Ok(meeting) => Some(meeting),
            Err(e) => {
                subs.send_self(Envelope::error(e.message()));
                return;
            }
        },
        None => None,
    };

    let name = display_name(user);
    let (participants, newly_present) = state
        .meeting_rooms
        .join(&room_id, user.user_id, name.clone(), socket_id)
        .await;

    let hub_room = meeting_room(&room_id);
    subs.join(&hub_room).await;
    joined_rooms.insert(room_id.clone());

    let messages = state.meeting_rooms.messages(&room_id).await;
    subs.send_self(Envelope::new(
        "meeting_state",
        json!({
            "meeting": meeting,
            "participants": participants,
            "messages": messages,
        }),
    ));

    state
        .hub
        .send(
            &hub_room,
            Envelope::new(
                "participant_joined",
                json!({
                    "userId": user.user_id.to_string(),
                    "displayName": name,
                    "participants": participants,
                }),
            )
            .excluding(socket_id),
        )
        .await;

    if newly_present {
        if let (Some(pool), Some(meeting)) = (&state.db_pool, &meeting) {
            service::notify_presence_established(pool, meeting, user.user_id, &name).await;
        }
    }
}

async fn handle_message(
    state: &AppState,
    user: &crate::auth::AuthenticatedUser,
    subs: &mut RoomSubscriptions,
    data: &Value,
) {
    let Some(room_id) = room_id_from(data) else {
        subs.send_self(Envelope::error("send_message requires meetingRoomId"));
        return;
    };
    let Some(content) = data.get("content").and_then(|v| v.as_str()) else {
        subs.send_self(Envelope::error("send_message requires content"));
        return;
    };

    let hub_room = meeting_room(&room_id);
    if !subs.is_joined(&hub_room) {
        subs.send_self(Envelope::error("not joined to that meeting"));
        return;
    }

    let message = state
        .meeting_rooms
        .push_message(&room_id, user.user_id, display_name(user), content.to_string())
        .await;

    state
        .hub
        .send(
            &hub_room,
            Envelope::new("meeting_message", serde_json::to_value(&message).unwrap_or(Value::Null)),
        )
        .await;
}

async fn leave_meeting(
    state: &AppState,
    user: &crate::auth::AuthenticatedUser,
    socket_id: Uuid,
    subs: &mut RoomSubscriptions,
    room_id: &str,
) {
    let (removed, _empty) = state.meeting_rooms.leave(room_id, socket_id).await;
    let hub_room = meeting_room(room_id);

    if removed.is_some() {
        let participants = state.meeting_rooms.participants(room_id).await;
        state
            .hub
            .send(
                &hub_room,
                Envelope::new(
                    "participant_left",
                    json!({
                        "userId": user.user_id.to_string(),
                        "participants": participants,
                    }),
                )
                .excluding(socket_id),
            )
            .await;
    }
    subs.leave(&hub_room).await;
}
