//! Chat delivery
//!
//! Conversation management and real-time message delivery with the
//! personal-room dedup rule: a participant joined to the conversation
//! room receives the message there and must not get a second copy on
//! their personal room.

use crate::error::{AppError, AppResult};
use crate::notify::notify_chat_message;
use crate::realtime::hub::{conversation_room, user_room};
use crate::realtime::{Envelope, SocketHub};
use crate::store::conversations::{
    create_conversation, find_direct_conversation, get_conversation_by_id, get_message_with_sender,
    insert_message, mark_conversation_read, Conversation, MessageWithSender,
};
use crate::store::users::get_user_by_id;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

const MESSAGE_FETCH_RETRIES: u32 = 3;
const MESSAGE_FETCH_BACKOFF: Duration = Duration::from_millis(100);

/// Create a conversation. Direct conversations between the same pair
/// are unique: an existing one is returned instead of a duplicate.
pub async fn create_or_get_conversation(
    pool: &PgPool,
    kind: &str,
    name: Option<&str>,
    participants: &[Uuid],
) -> AppResult<Conversation> {
    if participants.len() < 2 {
        return Err(AppError::invalid_argument(
            "a conversation needs at least two participants",
        ));
    }

    match kind {
        "direct" => {
            if participants.len() != 2 {
                return Err(AppError::invalid_argument(
                    "a direct conversation has exactly two participants",
                ));
            }
            if let Some(existing) =
                find_direct_conversation(pool, participants[0], participants[1]).await?
            {
                return Ok(existing);
            }
            Ok(create_conversation(pool, "direct", None, participants).await?)
        }
        "group" => Ok(create_conversation(pool, "group", name, participants).await?),
        other => Err(AppError::invalid_argument(format!(
            "unknown conversation type: {other}"
        ))),
    }
}

/// Persist and deliver one message.
///
/// The freshly written row is re-read with sender attributes; when the
/// read lags the write it is retried up to 3 times with 100 ms backoff,
/// falling back to the in-memory row.
pub async fn send_message(
    pool: &PgPool,
    hub: &SocketHub,
    conversation_id: Uuid,
    sender: Uuid,
    content: &str,
    kind: &str,
    metadata: Option<&Value>,
) -> AppResult<MessageWithSender> {
    let conversation = get_conversation_by_id(pool, conversation_id)
        .await?
        .ok_or_else(|| AppError::not_found("conversation not found"))?;
    if !conversation.participants.contains(&sender) {
        return Err(AppError::forbidden("not a participant of this conversation"));
    }

    let message = insert_message(pool, conversation_id, sender, content, kind, metadata).await?;

    let mut full = None;
    for attempt in 0..MESSAGE_FETCH_RETRIES {
        match get_message_with_sender(pool, message.id).await {
            Ok(Some(found)) => {
                full = Some(found);
                break;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(attempt, "message re-read failed: {:?}", e);
            }
        }
        tokio::time::sleep(MESSAGE_FETCH_BACKOFF).await;
    }
    let full = full.unwrap_or(MessageWithSender {
        message,
        sender: None,
    });

    let frame = Envelope::new("new_message", serde_json::to_value(&full)?);
    let room = conversation_room(conversation_id);
    hub.send(&room, frame.clone()).await;

    // personal-room delivery, skipping anyone already in the
    // conversation room
    let sender_name = match get_user_by_id(pool, sender).await? {
        Some(user) => user.display_name(),
        None => "Someone".to_string(),
    };
    let preview: String = content.chars().take(80).collect();

    for &participant in &conversation.participants {
        if !hub.is_member(&room, participant).await {
            hub.send(&user_room(participant), frame.clone()).await;
        }
    }

    notify_chat_message(
        pool,
        &conversation.participants,
        sender,
        &sender_name,
        conversation_id,
        &preview,
    )
    .await;

    Ok(full)
}

/// Mark a conversation read for the reader and tell the room.
pub async fn mark_read(
    pool: &PgPool,
    hub: &SocketHub,
    conversation_id: Uuid,
    reader: Uuid,
) -> AppResult<u64> {
    let conversation = get_conversation_by_id(pool, conversation_id)
        .await?
        .ok_or_else(|| AppError::not_found("conversation not found"))?;
    if !conversation.participants.contains(&reader) {
        return Err(AppError::forbidden("not a participant of this conversation"));
    }

    let updated = mark_conversation_read(pool, conversation_id, reader).await?;
    if updated > 0 {
        hub.send(
            &conversation_room(conversation_id),
            Envelope::new(
                "messages_read",
                json!({
                    "conversationId": conversation_id.to_string(),
                    "readBy": reader.to_string(),
                    "count": updated,
                }),
            ),
        )
        .await;
    }
    Ok(updated)
}
