//! Notification rows

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

fn notification_from_row(row: &sqlx::postgres::PgRow) -> Notification {
    Notification {
        id: row.get("id"),
        recipient: row.get("recipient"),
        title: row.get("title"),
        message: row.get("message"),
        kind: row.get("kind"),
        read: row.get("read"),
        read_at: row.get("read_at"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
    }
}

pub async fn insert_notification(
    pool: &PgPool,
    recipient: Uuid,
    title: &str,
    message: &str,
    kind: &str,
    metadata: &Value,
) -> Result<Notification, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO notifications (id, recipient, title, message, kind, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(recipient)
    .bind(title)
    .bind(message)
    .bind(kind)
    .bind(metadata)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Notification {
        id,
        recipient,
        title: title.to_string(),
        message: message.to_string(),
        kind: kind.to_string(),
        read: false,
        read_at: None,
        metadata: metadata.clone(),
        created_at: now,
    })
}

/// Dedup lookup: has a notification with the same recipient, kind, and
/// `(documentId, actorId)` metadata pair been created in the trailing
/// window?
pub async fn exists_recent_duplicate(
    pool: &PgPool,
    recipient: Uuid,
    kind: &str,
    document_id: Uuid,
    actor_id: Uuid,
    window: Duration,
) -> Result<bool, sqlx::Error> {
    let since = Utc::now() - window;
    let row = sqlx::query(
        r#"
        SELECT 1 AS hit FROM notifications
        WHERE recipient = $1
          AND kind = $2
          AND metadata->>'documentId' = $3
          AND metadata->>'actorId' = $4
          AND created_at > $5
        LIMIT 1
        "#,
    )
    .bind(recipient)
    .bind(kind)
    .bind(document_id.to_string())
    .bind(actor_id.to_string())
    .bind(since)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

pub async fn list_for_user(
    pool: &PgPool,
    recipient: Uuid,
    limit: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, recipient, title, message, kind, read, read_at, metadata, created_at
        FROM notifications
        WHERE recipient = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(recipient)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(notification_from_row).collect())
}

pub async fn unread_count(pool: &PgPool, recipient: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS unread FROM notifications WHERE recipient = $1 AND read = FALSE",
    )
    .bind(recipient)
    .fetch_one(pool)
    .await?;
    Ok(row.get("unread"))
}

pub async fn mark_read(
    pool: &PgPool,
    notification_id: Uuid,
    recipient: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE notifications SET read = TRUE, read_at = $1 WHERE id = $2 AND recipient = $3",
    )
    .bind(Utc::now())
    .bind(notification_id)
    .bind(recipient)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Bulk mark-all-read for one recipient.
pub async fn mark_all_read(pool: &PgPool, recipient: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE notifications SET read = TRUE, read_at = $1 WHERE recipient = $2 AND read = FALSE",
    )
    .bind(Utc::now())
    .bind(recipient)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_notification(
    pool: &PgPool,
    notification_id: Uuid,
    recipient: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient = $2")
        .bind(notification_id)
        .bind(recipient)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
