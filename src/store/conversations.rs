//! Conversations and messages

use crate::store::users::UserSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub kind: String,
    pub name: Option<String>,
    pub participants: Vec<Uuid>,
    pub last_message_id: Option<Uuid>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: String,
    pub metadata: Option<Value>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A message with its sender attributes populated, as broadcast to rooms.
#[derive(Debug, Clone, Serialize)]
pub struct MessageWithSender {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<UserSummary>,
}

fn conversation_from_row(row: &sqlx::postgres::PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        kind: row.get("kind"),
        name: row.get("name"),
        participants: row.get("participants"),
        last_message_id: row.get("last_message_id"),
        last_activity: row.get("last_activity"),
        created_at: row.get("created_at"),
    }
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        kind: row.get("kind"),
        metadata: row.get("metadata"),
        read: row.get("read"),
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
    }
}

const CONVERSATION_COLUMNS: &str =
    "id, kind, name, participants, last_message_id, last_activity, created_at";

pub async fn create_conversation(
    pool: &PgPool,
    kind: &str,
    name: Option<&str>,
    participants: &[Uuid],
) -> Result<Conversation, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO conversations (id, kind, name, participants, last_activity, created_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(id)
    .bind(kind)
    .bind(name)
    .bind(participants)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Conversation {
        id,
        kind: kind.to_string(),
        name: name.map(|s| s.to_string()),
        participants: participants.to_vec(),
        last_message_id: None,
        last_activity: now,
        created_at: now,
    })
}

pub async fn get_conversation_by_id(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<Option<Conversation>, sqlx::Error> {
    let row = sqlx::query(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
    ))
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(conversation_from_row))
}

/// Find an existing direct conversation between exactly this pair.
pub async fn find_direct_conversation(
    pool: &PgPool,
    a: Uuid,
    b: Uuid,
) -> Result<Option<Conversation>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {CONVERSATION_COLUMNS} FROM conversations
        WHERE kind = 'direct'
          AND participants @> ARRAY[$1, $2]::uuid[]
          AND cardinality(participants) = 2
        LIMIT 1
        "#
    ))
    .bind(a)
    .bind(b)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(conversation_from_row))
}

pub async fn list_conversations_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<Conversation>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {CONVERSATION_COLUMNS} FROM conversations
        WHERE $1 = ANY(participants)
        ORDER BY last_activity DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(conversation_from_row).collect())
}

pub async fn insert_message(
    pool: &PgPool,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: &str,
    kind: &str,
    metadata: Option<&Value>,
) -> Result<Message, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO messages (id, conversation_id, sender_id, content, kind, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(conversation_id)
    .bind(sender_id)
    .bind(content)
    .bind(kind)
    .bind(metadata)
    .bind(now)
    .execute(pool)
    .await?;

    sqlx::query(
        "UPDATE conversations SET last_message_id = $1, last_activity = $2 WHERE id = $3",
    )
    .bind(id)
    .bind(now)
    .bind(conversation_id)
    .execute(pool)
    .await?;

    Ok(Message {
        id,
        conversation_id,
        sender_id,
        content: content.to_string(),
        kind: kind.to_string(),
        metadata: metadata.cloned(),
        read: false,
        read_at: None,
        created_at: now,
    })
}

/// Fetch a message with sender attributes joined in.
pub async fn get_message_with_sender(
    pool: &PgPool,
    message_id: Uuid,
) -> Result<Option<MessageWithSender>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT m.id, m.conversation_id, m.sender_id, m.content, m.kind, m.metadata,
               m.read, m.read_at, m.created_at,
               u.id AS sender_user_id, u.first_name, u.last_name, u.email, u.avatar
        FROM messages m
        LEFT JOIN users u ON u.id = m.sender_id
        WHERE m.id = $1
        "#,
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let sender = row
            .try_get::<Uuid, _>("sender_user_id")
            .ok()
            .map(|id| UserSummary {
                id,
                first_name: row.get("first_name"),
                last_name: row.get("last_name"),
                email: row.get("email"),
                avatar: row.get("avatar"),
            });
        MessageWithSender {
            message: message_from_row(&row),
            sender,
        }
    }))
}

pub async fn list_messages(
    pool: &PgPool,
    conversation_id: Uuid,
    limit: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, conversation_id, sender_id, content, kind, metadata, read, read_at, created_at
        FROM messages
        WHERE conversation_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(conversation_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut messages: Vec<Message> = rows.iter().map(message_from_row).collect();
    messages.reverse();
    Ok(messages)
}

/// Mark everything sent by others in the conversation as read.
pub async fn mark_conversation_read(
    pool: &PgPool,
    conversation_id: Uuid,
    reader: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE messages SET read = TRUE, read_at = $1
        WHERE conversation_id = $2 AND sender_id <> $3 AND read = FALSE
        "#,
    )
    .bind(Utc::now())
    .bind(conversation_id)
    .bind(reader)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn unread_message_count(
    pool: &PgPool,
    conversation_id: Uuid,
    reader: Uuid,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS unread FROM messages
        WHERE conversation_id = $1 AND sender_id <> $2 AND read = FALSE
        "#,
    )
    .bind(conversation_id)
    .bind(reader)
    .fetch_one(pool)
    .await?;
    Ok(row.get("unread"))
}
