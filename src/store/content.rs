//! Content blobs
//!
//! The current serialized editor state of a document. Logically there is
//! exactly one blob per document, but the table carries no unique index:
//! a restore deliberately inserts a fresh row, and concurrent first
//! writers may race. The read path self-heals by keeping the newest row
//! (by `updated_at`) and deleting the rest, so the invariant holds at
//! every read even though the table briefly holds duplicates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ContentBlob {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn blob_from_row(row: &sqlx::postgres::PgRow) -> ContentBlob {
    ContentBlob {
        id: row.get("id"),
        document_id: row.get("document_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Upsert-by-document: update the newest existing row, insert when none
/// exists. `updated_at` is always stamped; `created_at` only on insert.
pub async fn save_content(
    pool: &PgPool,
    document_id: Uuid,
    content: &str,
) -> Result<ContentBlob, sqlx::Error> {
    let now = Utc::now();

    let updated = sqlx::query(
        r#"
        UPDATE content_blobs
        SET content = $1, updated_at = $2
        WHERE id = (
            SELECT id FROM content_blobs
            WHERE document_id = $3
            ORDER BY updated_at DESC
            LIMIT 1
        )
        RETURNING id, document_id, content, created_at, updated_at
        "#,
    )
    .bind(content)
    .bind(now)
    .bind(document_id)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = updated {
        return Ok(blob_from_row(&row));
    }

    insert_content(pool, document_id, content).await
}

/// Insert a fresh row without touching existing ones. Restore uses this
/// so restoration is visible as a new content event; the read path
/// collapses the duplicate.
pub async fn insert_content(
    pool: &PgPool,
    document_id: Uuid,
    content: &str,
) -> Result<ContentBlob, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO content_blobs (id, document_id, content, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        "#,
    )
    .bind(id)
    .bind(document_id)
    .bind(content)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ContentBlob {
        id,
        document_id,
        content: content.to_string(),
        created_at: now,
        updated_at: now,
    })
}

/// Latest blob for a document, collapsing duplicates: keep the most
/// recently updated row, delete the rest.
pub async fn latest_for_document(
    pool: &PgPool,
    document_id: Uuid,
) -> Result<Option<ContentBlob>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, document_id, content, created_at, updated_at
        FROM content_blobs
        WHERE document_id = $1
        ORDER BY updated_at DESC
        "#,
    )
    .bind(document_id)
    .fetch_all(pool)
    .await?;

    let mut iter = rows.iter();
    let Some(newest) = iter.next() else {
        return Ok(None);
    };
    let blob = blob_from_row(newest);

    let stale: Vec<Uuid> = iter.map(|row| row.get::<Uuid, _>("id")).collect();
    if !stale.is_empty() {
        tracing::warn!(
            document_id = %document_id,
            duplicates = stale.len(),
            "collapsing duplicate content blobs"
        );
        sqlx::query("DELETE FROM content_blobs WHERE id = ANY($1)")
            .bind(&stale)
            .execute(pool)
            .await?;
    }

    Ok(Some(blob))
}
