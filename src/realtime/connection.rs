//! Per-socket room subscriptions
//!
//! Each WebSocket connection funnels its outbound frames through one
//! mpsc channel; joining a room spawns a forwarder task piping the
//! room's broadcast receiver into that funnel. Leaving aborts the
//! forwarder and releases membership.

use crate::realtime::{Envelope, SocketHub};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub struct RoomSubscriptions {
    hub: SocketHub,
    user_id: Uuid,
    socket_id: Uuid,
    out: mpsc::UnboundedSender<Envelope>,
    forwarders: HashMap<String, JoinHandle<()>>,
}

impl RoomSubscriptions {
    pub fn new(
        hub: SocketHub,
        user_id: Uuid,
        socket_id: Uuid,
        out: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            hub,
            user_id,
            socket_id,
            out,
            forwarders: HashMap::new(),
        }
    }

    /// Deliver a frame to this socket only.
    pub fn send_self(&self, envelope: Envelope) {
        // receiver dropped means the socket is closing; nothing to do
        let _ = self.out.send(envelope);
    }

    /// Join a room and start forwarding its frames to this socket.
    /// Re-joining an already joined room is a no-op.
    pub async fn join(&mut self, room: &str) {
        if self.forwarders.contains_key(room) {
            return;
        }

        let mut rx = self.hub.join(room, self.user_id).await;
        let out = self.out.clone();
        let socket_id = self.socket_id;
        let room_name = room.to_string();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        if envelope.exclude_socket == Some(socket_id) {
                            continue;
                        }
                        if out.send(envelope).is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(room = %room_name, skipped, "socket lagged behind room broadcast");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.forwarders.insert(room.to_string(), handle);
    }

    pub async fn leave(&mut self, room: &str) {
        if let Some(handle) = self.forwarders.remove(room) {
            handle.abort();
            self.hub.leave(room, self.user_id).await;
        }
    }

    pub fn is_joined(&self, room: &str) -> bool {
        self.forwarders.contains_key(room)
    }

    pub fn rooms(&self) -> Vec<String> {
        self.forwarders.keys().cloned().collect()
    }

    /// Tear down every subscription, returning the rooms that were
    /// joined so the caller can run per-room leave protocols.
    pub async fn leave_all(&mut self) -> Vec<String> {
        let rooms = self.rooms();
        for room in &rooms {
            self.leave(room).await;
        }
        rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_join_forwards_frames() {
        let hub = SocketHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subs = RoomSubscriptions::new(hub.clone(), Uuid::new_v4(), Uuid::new_v4(), tx);

        subs.join("room-a").await;
        hub.send("room-a", Envelope::new("hello", json!(1))).await;

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, "hello");
    }

    #[tokio::test]
    async fn test_excluded_socket_is_skipped() {
        let hub = SocketHub::new();
        let socket = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subs = RoomSubscriptions::new(hub.clone(), Uuid::new_v4(), socket, tx);

        subs.join("room-a").await;
        hub.send("room-a", Envelope::new("peers_only", json!(null)).excluding(socket))
            .await;
        hub.send("room-a", Envelope::new("for_everyone", json!(null)))
            .await;

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, "for_everyone");
    }

    #[tokio::test]
    async fn test_leave_stops_forwarding() {
        let hub = SocketHub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let user = Uuid::new_v4();
        let mut subs = RoomSubscriptions::new(hub.clone(), user, Uuid::new_v4(), tx);

        subs.join("room-a").await;
        subs.leave("room-a").await;
        assert!(!subs.is_joined("room-a"));
        assert!(!hub.is_member("room-a", user).await);

        hub.send("room-a", Envelope::new("late", json!(null))).await;
        subs.send_self(Envelope::new("direct", json!(null)));
        // only the direct frame arrives
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.event, "direct");
    }

    #[tokio::test]
    async fn test_leave_all_reports_rooms() {
        let hub = SocketHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut subs = RoomSubscriptions::new(hub, Uuid::new_v4(), Uuid::new_v4(), tx);

        subs.join("a").await;
        subs.join("b").await;
        let mut rooms = subs.leave_all().await;
        rooms.sort();
        assert_eq!(rooms, vec!["a".to_string(), "b".to_string()]);
        assert!(subs.rooms().is_empty());
    }
}
