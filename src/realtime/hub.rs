//! Room-addressed broadcast hub
//!
//! One `tokio::sync::broadcast` channel per room, created on first
//! subscribe and dropped when the last member leaves. Rooms are plain
//! string keys: document ids, `conversation:<id>`, `meeting:<room>`,
//! and per-user rooms `user:<id>` for personal delivery.
//!
//! Membership is tracked separately from subscription so senders can
//! ask "is this user currently in that room" — the chat dedup rule
//! depends on it.

use crate::realtime::Envelope;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;
use uuid::Uuid;

const ROOM_CHANNEL_CAPACITY: usize = 256;

/// Addressable room key for a user's personal channel.
pub fn user_room(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

pub fn conversation_room(conversation_id: Uuid) -> String {
    format!("conversation:{conversation_id}")
}

pub fn meeting_room(meeting_room_id: &str) -> String {
    format!("meeting:{meeting_room_id}")
}

#[derive(Default)]
struct HubInner {
    channels: HashMap<String, broadcast::Sender<Envelope>>,
    /// room -> user id -> live socket count. One user may hold several
    /// sockets in the same room; membership ends with the last one.
    members: HashMap<String, HashMap<Uuid, usize>>,
}

/// Shared broadcast hub. Cloning is cheap; all clones address the same
/// rooms.
#[derive(Clone, Default)]
pub struct SocketHub {
    inner: Arc<RwLock<HubInner>>,
}

impl SocketHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a room: register this socket's membership and return a
    /// receiver for its frames. The channel is created on first join.
    pub async fn join(&self, room: &str, user_id: Uuid) -> broadcast::Receiver<Envelope> {
        let mut inner = self.inner.write().await;
        *inner
            .members
            .entry(room.to_string())
            .or_default()
            .entry(user_id)
            .or_insert(0) += 1;
        inner
            .channels
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Leave a room with one socket. The user stays a member while any
    /// other socket of theirs remains; the channel itself is dropped
    /// once the member set empties, and late receivers simply see the
    /// stream end.
    pub async fn leave(&self, room: &str, user_id: Uuid) {
        let mut inner = self.inner.write().await;
        let empty = match inner.members.get_mut(room) {
            Some(members) => {
                if let Some(count) = members.get_mut(&user_id) {
                    *count -= 1;
                    if *count == 0 {
                        members.remove(&user_id);
                    }
                }
                members.is_empty()
            }
            None => false,
        };
        if empty {
            inner.members.remove(room);
            inner.channels.remove(room);
        }
    }

    /// Broadcast a frame to everyone in the room. Returns the number of
    /// receivers; zero when the room does not exist.
    pub async fn send(&self, room: &str, envelope: Envelope) -> usize {
        let inner = self.inner.read().await;
        match inner.channels.get(room) {
            Some(tx) => tx.send(envelope).unwrap_or(0),
            None => {
                tracing::debug!(room, "no subscribers for room broadcast");
                0
            }
        }
    }

    /// Whether the user is currently joined to the room.
    pub async fn is_member(&self, room: &str, user_id: Uuid) -> bool {
        let inner = self.inner.read().await;
        inner
            .members
            .get(room)
            .map(|members| members.contains_key(&user_id))
            .unwrap_or(false)
    }

    /// Current member ids of a room.
    pub async fn members(&self, room: &str) -> Vec<Uuid> {
        let inner = self.inner.read().await;
        inner
            .members
            .get(room)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Users with a live personal room, i.e. currently connected.
    pub async fn online_users(&self) -> Vec<Uuid> {
        let inner = self.inner.read().await;
        inner
            .members
            .keys()
            .filter_map(|room| room.strip_prefix("user:"))
            .filter_map(|id| Uuid::parse_str(id).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_join_send_receive() {
        let hub = SocketHub::new();
        let user = Uuid::new_v4();
        let mut rx = hub.join("doc-1", user).await;

        let delivered = hub.send("doc-1", Envelope::new("ping", json!({}))).await;
        assert_eq!(delivered, 1);

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, "ping");
    }

    #[tokio::test]
    async fn test_send_to_absent_room() {
        let hub = SocketHub::new();
        assert_eq!(hub.send("nowhere", Envelope::error("x")).await, 0);
    }

    #[tokio::test]
    async fn test_membership_tracking() {
        let hub = SocketHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let _rx = hub.join("room", a).await;
        assert!(hub.is_member("room", a).await);
        assert!(!hub.is_member("room", b).await);

        hub.leave("room", a).await;
        assert!(!hub.is_member("room", a).await);
        assert!(hub.members("room").await.is_empty());
    }

    #[tokio::test]
    async fn test_room_dropped_when_last_member_leaves() {
        let hub = SocketHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let ra = hub.join("room", a).await;
        let _rb = hub.join("room", b).await;
        hub.leave("room", a).await;
        drop(ra);
        // b still present, channel alive
        assert_eq!(hub.send("room", Envelope::new("x", json!(null))).await, 1);

        hub.leave("room", b).await;
        assert_eq!(hub.send("room", Envelope::new("x", json!(null))).await, 0);
    }

    #[tokio::test]
    async fn test_user_with_two_sockets_survives_closing_one() {
        let hub = SocketHub::new();
        let user = Uuid::new_v4();

        // same user, two tabs
        let tab1 = hub.join("doc-1", user).await;
        let mut tab2 = hub.join("doc-1", user).await;

        hub.leave("doc-1", user).await;
        drop(tab1);
        assert!(hub.is_member("doc-1", user).await);

        // the surviving tab still receives room traffic
        assert_eq!(hub.send("doc-1", Envelope::new("ping", json!({}))).await, 1);
        assert_eq!(tab2.recv().await.unwrap().event, "ping");

        hub.leave("doc-1", user).await;
        assert!(!hub.is_member("doc-1", user).await);
        assert_eq!(hub.send("doc-1", Envelope::new("ping", json!({}))).await, 0);
    }

    #[tokio::test]
    async fn test_online_users_from_personal_rooms() {
        let hub = SocketHub::new();
        let a = Uuid::new_v4();
        let _rx = hub.join(&user_room(a), a).await;
        let online = hub.online_users().await;
        assert_eq!(online, vec![a]);
    }
}
