//! Version snapshots
//!
//! Immutable numbered copies of a document's content. Snapshots are
//! never updated or renumbered; retention soft-deletes the tail.

use crate::store::users::UserSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentVersion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version: i32,
    pub content: String,
    pub created_by: Uuid,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A snapshot with its author populated, as returned by listVersions.
#[derive(Debug, Clone, Serialize)]
pub struct VersionWithAuthor {
    #[serde(flatten)]
    pub version: DocumentVersion,
    pub author: Option<UserSummary>,
}

fn version_from_row(row: &sqlx::postgres::PgRow) -> DocumentVersion {
    DocumentVersion {
        id: row.get("id"),
        document_id: row.get("document_id"),
        version: row.get("version"),
        content: row.get("content"),
        created_by: row.get("created_by"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

pub async fn insert_version(
    pool: &PgPool,
    document_id: Uuid,
    version: i32,
    content: &str,
    created_by: Uuid,
    description: Option<&str>,
) -> Result<DocumentVersion, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO document_versions (id, document_id, version, content, created_by, description, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(document_id)
    .bind(version)
    .bind(content)
    .bind(created_by)
    .bind(description)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(DocumentVersion {
        id,
        document_id,
        version,
        content: content.to_string(),
        created_by,
        description: description.map(|s| s.to_string()),
        created_at: now,
    })
}

pub async fn get_version_by_id(
    pool: &PgPool,
    version_id: Uuid,
) -> Result<Option<DocumentVersion>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, document_id, version, content, created_by, description, created_at
        FROM document_versions
        WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(version_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(version_from_row))
}

/// All live snapshots for a document, newest version first, with their
/// authors joined in.
pub async fn list_versions(
    pool: &PgPool,
    document_id: Uuid,
) -> Result<Vec<VersionWithAuthor>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT v.id, v.document_id, v.version, v.content, v.created_by, v.description, v.created_at,
               u.id AS author_id, u.first_name, u.last_name, u.email, u.avatar
        FROM document_versions v
        LEFT JOIN users u ON u.id = v.created_by
        WHERE v.document_id = $1 AND v.deleted_at IS NULL
        ORDER BY v.version DESC
        "#,
    )
    .bind(document_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let author = row
                .try_get::<Uuid, _>("author_id")
                .ok()
                .map(|id| UserSummary {
                    id,
                    first_name: row.get("first_name"),
                    last_name: row.get("last_name"),
                    email: row.get("email"),
                    avatar: row.get("avatar"),
                });
            VersionWithAuthor {
                version: version_from_row(&row),
                author,
            }
        })
        .collect())
}

/// Soft-delete a single snapshot, recording who removed it.
pub async fn soft_delete_version(
    pool: &PgPool,
    version_id: Uuid,
    deleted_by: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE document_versions SET deleted_at = $1, deleted_by = $2 WHERE id = $3 AND deleted_at IS NULL",
    )
    .bind(Utc::now())
    .bind(deleted_by)
    .bind(version_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Hard-delete everything older than the `keep` most recent snapshots,
/// returning the pruned ids so the document's prior-version list can be
/// trimmed to match. Soft-deleted rows rank like live ones here, so
/// tombstones also age out instead of accumulating forever.
pub async fn prune_versions(
    pool: &PgPool,
    document_id: Uuid,
    keep: i64,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        DELETE FROM document_versions
        WHERE id IN (
            SELECT id FROM document_versions
            WHERE document_id = $1
            ORDER BY version DESC
            OFFSET $2
        )
        RETURNING id
        "#,
    )
    .bind(document_id)
    .bind(keep)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| row.get("id")).collect())
}
