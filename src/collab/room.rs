//! Document rooms
//!
//! In-memory session state for one document: the authoritative CRDT
//! replica, the connected participants, and the buffered serialized
//! content used by auto-save. The editor state lives in a single text
//! field named `editor` for parity with the client library.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;
use yrs::updates::decoder::Decode;
use yrs::{Doc, GetString, ReadTxn, StateVector, Text, Transact, Update};

/// Fixed palette assigned to joiners by join order.
pub const PARTICIPANT_COLORS: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7",
    "#DDA0DD", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E9",
];

pub const EDITOR_FIELD: &str = "editor";

/// A connected participant. One user may hold several sockets; each
/// socket is its own participant entry.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub color: String,
    #[serde(rename = "socketId")]
    pub socket_id: Uuid,
    pub cursor: Option<Value>,
    #[serde(rename = "lastSeen")]
    pub last_seen: DateTime<Utc>,
}

/// One live room per document id.
pub struct Room {
    pub document_id: Uuid,
    doc: Doc,
    participants: Vec<Participant>,
    /// Total joins over the room's lifetime; drives color assignment.
    join_counter: usize,
    /// Last successfully extracted content, buffered for snapshotting
    /// without re-deriving from the CRDT.
    pub buffered_content: Option<String>,
    /// Set when an update arrived since the last successful save.
    pub dirty: bool,
    /// Author of the most recent update; credited on auto-save.
    pub last_editor: Option<Uuid>,
}

impl Room {
    pub fn new(document_id: Uuid) -> Self {
        let doc = Doc::new();
        doc.get_or_insert_text(EDITOR_FIELD);
        Self {
            document_id,
            doc,
            participants: Vec::new(),
            join_counter: 0,
            buffered_content: None,
            dirty: false,
            last_editor: None,
        }
    }

    /// Seed the CRDT with the persisted content blob. Only meaningful on
    /// a freshly materialized room.
    pub fn seed(&mut self, content: &str) {
        if content.is_empty() {
            return;
        }
        let text = self.doc.get_or_insert_text(EDITOR_FIELD);
        let mut txn = self.doc.transact_mut();
        text.push(&mut txn, content);
        self.buffered_content = Some(content.to_string());
    }

    /// Apply an opaque client update to the local replica.
    pub fn apply_update(&mut self, update_bytes: &[u8]) -> AppResult<()> {
        let update = Update::decode_v1(update_bytes)
            .map_err(|e| AppError::invalid_argument(format!("undecodable update: {e}")))?;
        let mut txn = self.doc.transact_mut();
        txn.apply_update(update)
            .map_err(|e| AppError::invalid_argument(format!("unappliable update: {e}")))?;
        drop(txn);
        self.dirty = true;
        Ok(())
    }

    /// Full document state as a v1 update, for the initial `yjs_sync`.
    pub fn state_as_update(&self) -> Vec<u8> {
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Current contents of the editor text field.
    pub fn text(&self) -> String {
        let text = self.doc.get_or_insert_text(EDITOR_FIELD);
        let txn = self.doc.transact();
        text.get_string(&txn)
    }

    /// Add a participant, assigning the next palette color.
    pub fn add_participant(&mut self, user_id: Uuid, display_name: String, socket_id: Uuid) -> &Participant {
        let color = PARTICIPANT_COLORS[self.join_counter % PARTICIPANT_COLORS.len()];
        self.join_counter += 1;
        self.participants.push(Participant {
            user_id,
            display_name,
            color: color.to_string(),
            socket_id,
            cursor: None,
            last_seen: Utc::now(),
        });
        self.participants.last().expect("just pushed")
    }

    pub fn remove_participant(&mut self, socket_id: Uuid) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| p.socket_id == socket_id)?;
        Some(self.participants.remove(idx))
    }

    pub fn update_cursor(&mut self, socket_id: Uuid, cursor: Value) -> bool {
        match self.participants.iter_mut().find(|p| p.socket_id == socket_id) {
            Some(p) => {
                p.cursor = Some(cursor);
                p.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_then_text() {
        let mut room = Room::new(Uuid::new_v4());
        room.seed(r#"{"blocks":[]}"#);
        assert_eq!(room.text(), r#"{"blocks":[]}"#);
    }

    #[test]
    fn test_empty_seed_is_noop() {
        let mut room = Room::new(Uuid::new_v4());
        room.seed("");
        assert_eq!(room.text(), "");
        assert!(room.buffered_content.is_none());
    }

    #[test]
    fn test_palette_assignment_by_join_order() {
        let mut room = Room::new(Uuid::new_v4());
        for i in 0..12 {
            let color = room
                .add_participant(Uuid::new_v4(), format!("user{i}"), Uuid::new_v4())
                .color
                .clone();
            assert_eq!(color, PARTICIPANT_COLORS[i % 10]);
        }
        // colors wrap after the tenth joiner
        assert_eq!(room.participants()[10].color, PARTICIPANT_COLORS[0]);
    }

    #[test]
    fn test_remove_participant() {
        let mut room = Room::new(Uuid::new_v4());
        let socket = Uuid::new_v4();
        room.add_participant(Uuid::new_v4(), "a".into(), socket);
        assert!(!room.is_empty());
        let removed = room.remove_participant(socket).unwrap();
        assert_eq!(removed.socket_id, socket);
        assert!(room.is_empty());
        assert!(room.remove_participant(socket).is_none());
    }

    #[test]
    fn test_cursor_update_touches_last_seen() {
        let mut room = Room::new(Uuid::new_v4());
        let socket = Uuid::new_v4();
        room.add_participant(Uuid::new_v4(), "a".into(), socket);
        assert!(room.update_cursor(socket, serde_json::json!({"index": 3})));
        assert_eq!(
            room.participants()[0].cursor,
            Some(serde_json::json!({"index": 3}))
        );
        assert!(!room.update_cursor(Uuid::new_v4(), serde_json::json!({})));
    }

    #[test]
    fn test_apply_update_rejects_garbage() {
        let mut room = Room::new(Uuid::new_v4());
        let err = room.apply_update(&[0xFF, 0xFF, 0xFF]).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        assert!(!room.dirty);
    }

    #[test]
    fn test_two_replicas_converge() {
        // peer A edits, B receives A's update, their texts agree
        let mut a = Room::new(Uuid::new_v4());
        let mut b = Room::new(Uuid::new_v4());
        a.seed("hello");

        let update = a.state_as_update();
        b.apply_update(&update).unwrap();
        assert_eq!(a.text(), b.text());
        assert!(b.dirty);
    }
}
