//! Fan-out semantics across the socket hub: room-wide broadcasts,
//! peer-only frames, and online-user bookkeeping.

use coscribe::realtime::hub::{conversation_room, user_room};
use coscribe::realtime::{Envelope, RoomSubscriptions, SocketHub};
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

struct TestSocket {
    subs: RoomSubscriptions,
    rx: mpsc::UnboundedReceiver<Envelope>,
    socket_id: Uuid,
}

fn socket(hub: &SocketHub, user_id: Uuid) -> TestSocket {
    let (tx, rx) = mpsc::unbounded_channel();
    let socket_id = Uuid::new_v4();
    TestSocket {
        subs: RoomSubscriptions::new(hub.clone(), user_id, socket_id, tx),
        rx,
        socket_id,
    }
}

async fn drain(rx: &mut mpsc::UnboundedReceiver<Envelope>) -> Vec<String> {
    let mut events = Vec::new();
    while let Ok(Some(envelope)) =
        tokio::time::timeout(std::time::Duration::from_millis(50), rx.recv()).await
    {
        events.push(envelope.event);
    }
    events
}

#[tokio::test]
async fn broadcast_reaches_every_room_member() {
    let hub = SocketHub::new();
    let doc_room = Uuid::new_v4().to_string();

    let mut a = socket(&hub, Uuid::new_v4());
    let mut b = socket(&hub, Uuid::new_v4());
    a.subs.join(&doc_room).await;
    b.subs.join(&doc_room).await;

    // a document edit goes to everyone, the sender included
    hub.send(&doc_room, Envelope::new("yjs_update", json!({"update": [1, 2]})))
        .await;

    assert_eq!(drain(&mut a.rx).await, vec!["yjs_update"]);
    assert_eq!(drain(&mut b.rx).await, vec!["yjs_update"]);
}

#[tokio::test]
async fn excluded_sender_sees_no_echo() {
    let hub = SocketHub::new();
    let doc_room = Uuid::new_v4().to_string();

    let mut a = socket(&hub, Uuid::new_v4());
    let mut b = socket(&hub, Uuid::new_v4());
    a.subs.join(&doc_room).await;
    b.subs.join(&doc_room).await;

    // cursor frames are peer-only
    hub.send(
        &doc_room,
        Envelope::new("cursor_updated", json!({"line": 1})).excluding(a.socket_id),
    )
    .await;

    assert!(drain(&mut a.rx).await.is_empty());
    assert_eq!(drain(&mut b.rx).await, vec!["cursor_updated"]);
}

#[tokio::test]
async fn frames_are_scoped_to_their_room() {
    let hub = SocketHub::new();
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    let mut a = socket(&hub, user_a);
    let mut b = socket(&hub, user_b);
    a.subs.join(&user_room(user_a)).await;
    a.subs.join(&conversation_room(conversation)).await;
    b.subs.join(&user_room(user_b)).await;

    // b is not in the conversation room and sees nothing there
    hub.send(
        &conversation_room(conversation),
        Envelope::new("new_message", json!({"content": "hi"})),
    )
    .await;
    // but the personal room still reaches b
    hub.send(&user_room(user_b), Envelope::new("new_message", json!({"content": "hi"})))
        .await;

    assert_eq!(drain(&mut a.rx).await, vec!["new_message"]);
    assert_eq!(drain(&mut b.rx).await, vec!["new_message"]);
}

#[tokio::test]
async fn closing_one_tab_keeps_the_other_listening() {
    let hub = SocketHub::new();
    let user = Uuid::new_v4();
    let doc_room = Uuid::new_v4().to_string();

    let mut tab1 = socket(&hub, user);
    let mut tab2 = socket(&hub, user);
    tab1.subs.join(&doc_room).await;
    tab2.subs.join(&doc_room).await;

    tab1.subs.leave(&doc_room).await;

    // the user is still a room member through the second tab
    assert!(hub.is_member(&doc_room, user).await);
    assert!(tab2.subs.is_joined(&doc_room));

    hub.send(&doc_room, Envelope::new("yjs_update", json!({"update": [7]})))
        .await;
    assert!(drain(&mut tab1.rx).await.is_empty());
    assert_eq!(drain(&mut tab2.rx).await, vec!["yjs_update"]);
}

#[tokio::test]
async fn online_users_follow_personal_rooms() {
    let hub = SocketHub::new();
    let user = Uuid::new_v4();

    let mut s = socket(&hub, user);
    s.subs.join(&user_room(user)).await;
    assert_eq!(hub.online_users().await, vec![user]);

    let left = s.subs.leave_all().await;
    assert_eq!(left.len(), 1);
    assert!(hub.online_users().await.is_empty());
}
