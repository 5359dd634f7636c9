//! End-to-end collaboration flow without persistence: join, concurrent
//! edits converging, presence, and room disposal.

use coscribe::collab::engine::CollabEngine;
use coscribe::config::CollabConfig;
use serde_json::json;
use uuid::Uuid;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, GetString, ReadTxn, StateVector, Text, Transact, Update};

fn engine() -> CollabEngine {
    CollabEngine::new(None, CollabConfig::default())
}

/// A client-side replica that produces the same opaque updates a real
/// editor would send.
struct Replica {
    doc: Doc,
}

impl Replica {
    fn new() -> Self {
        let doc = Doc::new();
        doc.get_or_insert_text("editor");
        Self { doc }
    }

    fn insert(&self, index: u32, chunk: &str) -> Vec<u8> {
        let text = self.doc.get_or_insert_text("editor");
        let before = {
            let txn = self.doc.transact();
            txn.state_vector().encode_v1()
        };
        {
            let mut txn = self.doc.transact_mut();
            text.insert(&mut txn, index, chunk);
        }
        let txn = self.doc.transact();
        txn.encode_state_as_update_v1(&StateVector::decode_v1(&before).unwrap())
    }

    fn apply(&self, update: &[u8]) {
        let mut txn = self.doc.transact_mut();
        txn.apply_update(Update::decode_v1(update).unwrap()).unwrap();
    }

    fn text(&self) -> String {
        let text = self.doc.get_or_insert_text("editor");
        let txn = self.doc.transact();
        text.get_string(&txn)
    }
}

#[tokio::test]
async fn join_edit_and_converge() {
    let engine = engine();
    let doc_id = Uuid::new_v4();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let (sock_a, sock_b) = (Uuid::new_v4(), Uuid::new_v4());

    let first = engine.join(doc_id, alice, "Alice", sock_a).await.unwrap();
    assert_eq!(first.users.len(), 1);
    assert!(first.content.is_empty());

    let replica = Replica::new();
    let update = replica.insert(0, r#"{"blocks":[{"text":"hello"}]}"#);
    engine.apply_update(doc_id, alice, &update).await.unwrap();

    // a late joiner receives the full state in its sync payload
    let second = engine.join(doc_id, bob, "Bob", sock_b).await.unwrap();
    assert_eq!(second.users.len(), 2);

    let late = Replica::new();
    late.apply(&second.sync);
    assert_eq!(late.text(), r#"{"blocks":[{"text":"hello"}]}"#);

    // the recovered content was buffered for snapshotting
    let content = engine.current_content(doc_id).await.unwrap();
    assert_eq!(content, r#"{"blocks":[{"text":"hello"}]}"#);
}

#[tokio::test]
async fn concurrent_edits_converge_regardless_of_order() {
    let engine = engine();
    let doc_id = Uuid::new_v4();
    let user = Uuid::new_v4();
    engine.join(doc_id, user, "User", Uuid::new_v4()).await.unwrap();

    let a = Replica::new();
    let b = Replica::new();

    let ua = a.insert(0, "abc");
    let ub = b.insert(0, "xyz");

    // both sides see both updates, in opposite order
    a.apply(&ub);
    b.apply(&ua);

    engine.apply_update(doc_id, user, &ub).await.unwrap();
    engine.apply_update(doc_id, user, &ua).await.unwrap();

    assert_eq!(a.text(), b.text());
    let outcome = engine
        .join(doc_id, Uuid::new_v4(), "Observer", Uuid::new_v4())
        .await
        .unwrap();
    let server = Replica::new();
    server.apply(&outcome.sync);
    assert_eq!(server.text(), a.text());
}

#[tokio::test]
async fn malformed_update_keeps_room_alive() {
    let engine = engine();
    let doc_id = Uuid::new_v4();
    let user = Uuid::new_v4();
    engine.join(doc_id, user, "User", Uuid::new_v4()).await.unwrap();

    let err = engine.apply_update(doc_id, user, &[0xFF, 0x00, 0x13]).await;
    assert!(err.is_err());

    // the room still accepts well-formed traffic
    let replica = Replica::new();
    let update = replica.insert(0, r#"{"ok":true}"#);
    engine.apply_update(doc_id, user, &update).await.unwrap();
    assert_eq!(
        engine.current_content(doc_id).await.unwrap(),
        r#"{"ok":true}"#
    );
}

#[tokio::test]
async fn presence_tracks_sockets_not_users() {
    let engine = engine();
    let doc_id = Uuid::new_v4();
    let user = Uuid::new_v4();
    let (sock_a, sock_b) = (Uuid::new_v4(), Uuid::new_v4());

    // one user, two tabs
    engine.join(doc_id, user, "User", sock_a).await.unwrap();
    engine.join(doc_id, user, "User", sock_b).await.unwrap();
    assert_eq!(engine.presence(doc_id).await.len(), 2);

    assert!(engine
        .cursor_update(doc_id, sock_a, json!({"line": 3, "ch": 14}))
        .await);
    let cursor = engine
        .presence(doc_id)
        .await
        .into_iter()
        .find(|p| p.socket_id == sock_a)
        .and_then(|p| p.cursor);
    assert_eq!(cursor, Some(json!({"line": 3, "ch": 14})));

    // closing one tab leaves the other present
    engine.leave(doc_id, sock_a).await;
    assert_eq!(engine.presence(doc_id).await.len(), 1);

    // closing the last disposes the room
    engine.leave(doc_id, sock_b).await;
    assert_eq!(engine.presence(doc_id).await.len(), 0);
}
