//! In-memory meeting rooms
//!
//! Presence plus an ephemeral message buffer per meeting room. Messages
//! are never persisted; the buffer keeps the last 200 and is dropped
//! with the room when the final participant leaves.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const MESSAGE_BUFFER_CAPACITY: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct MeetingParticipant {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "socketId")]
    pub socket_id: Uuid,
    #[serde(rename = "joinedAt")]
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingMessage {
    pub id: Uuid,
    #[serde(rename = "senderId")]
    pub sender_id: Uuid,
    #[serde(rename = "senderName")]
    pub sender_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct RoomState {
    participants: Vec<MeetingParticipant>,
    messages: VecDeque<MeetingMessage>,
}

/// Shared registry of live meeting rooms, keyed by `meetingRoomId`.
#[derive(Clone, Default)]
pub struct MeetingRooms {
    rooms: Arc<RwLock<HashMap<String, RoomState>>>,
}

impl MeetingRooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a presence. Returns `(participants, newly_present)`:
    /// `newly_present` is false when the user already had another
    /// socket in the room.
    pub async fn join(
        &self,
        room_id: &str,
        user_id: Uuid,
        display_name: String,
        socket_id: Uuid,
    ) -> (Vec<MeetingParticipant>, bool) {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_string()).or_default();

        let already_present = room.participants.iter().any(|p| p.user_id == user_id);
        room.participants.push(MeetingParticipant {
            user_id,
            display_name,
            socket_id,
            joined_at: Utc::now(),
        });

        (room.participants.clone(), !already_present)
    }

    /// Drop a presence. Returns the removed participant and whether the
    /// room is now empty (in which case it is disposed).
    pub async fn leave(&self, room_id: &str, socket_id: Uuid) -> (Option<MeetingParticipant>, bool) {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get_mut(room_id) else {
            return (None, false);
        };

        let removed = room
            .participants
            .iter()
            .position(|p| p.socket_id == socket_id)
            .map(|idx| room.participants.remove(idx));

        let empty = room.participants.is_empty();
        if empty {
            rooms.remove(room_id);
        }
        (removed, empty)
    }

    /// Append a message to the ring buffer, evicting the oldest past
    /// capacity. Returns the stored message.
    pub async fn push_message(
        &self,
        room_id: &str,
        sender_id: Uuid,
        sender_name: String,
        content: String,
    ) -> MeetingMessage {
        let message = MeetingMessage {
            id: Uuid::new_v4(),
            sender_id,
            sender_name,
            content,
            timestamp: Utc::now(),
        };

        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(room_id.to_string()).or_default();
        room.messages.push_back(message.clone());
        while room.messages.len() > MESSAGE_BUFFER_CAPACITY {
            room.messages.pop_front();
        }

        message
    }

    pub async fn participants(&self, room_id: &str) -> Vec<MeetingParticipant> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|room| room.participants.clone())
            .unwrap_or_default()
    }

    pub async fn messages(&self, room_id: &str) -> Vec<MeetingMessage> {
        let rooms = self.rooms.read().await;
        rooms
            .get(room_id)
            .map(|room| room.messages.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_reports_new_presence() {
        let rooms = MeetingRooms::new();
        let user = Uuid::new_v4();

        let (participants, newly) = rooms.join("m1", user, "a".into(), Uuid::new_v4()).await;
        assert_eq!(participants.len(), 1);
        assert!(newly);

        // second socket for the same user is not a new presence
        let (participants, newly) = rooms.join("m1", user, "a".into(), Uuid::new_v4()).await;
        assert_eq!(participants.len(), 2);
        assert!(!newly);
    }

    #[tokio::test]
    async fn test_room_disposed_when_empty() {
        let rooms = MeetingRooms::new();
        let socket = Uuid::new_v4();
        rooms.join("m1", Uuid::new_v4(), "a".into(), socket).await;
        rooms
            .push_message("m1", Uuid::new_v4(), "a".into(), "hi".into())
            .await;

        let (removed, empty) = rooms.leave("m1", socket).await;
        assert!(removed.is_some());
        assert!(empty);
        // buffer went with the room
        assert!(rooms.messages("m1").await.is_empty());
    }

    #[tokio::test]
    async fn test_message_ring_buffer_caps_at_200() {
        let rooms = MeetingRooms::new();
        let sender = Uuid::new_v4();
        for i in 0..250 {
            rooms
                .push_message("m1", sender, "a".into(), format!("msg {i}"))
                .await;
        }
        let messages = rooms.messages("m1").await;
        assert_eq!(messages.len(), MESSAGE_BUFFER_CAPACITY);
        assert_eq!(messages.first().unwrap().content, "msg 50");
        assert_eq!(messages.last().unwrap().content, "msg 249");
    }

    #[tokio::test]
    async fn test_leave_unknown_room() {
        let rooms = MeetingRooms::new();
        let (removed, empty) = rooms.leave("nowhere", Uuid::new_v4()).await;
        assert!(removed.is_none());
        assert!(!empty);
    }
}
