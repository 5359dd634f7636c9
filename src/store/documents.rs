//! Documents, collaborators, and engagement counters
//!
//! The `folder_ref` column is polymorphic JSONB: either a bare id string
//! or an embedded folder object. [`crate::access::extract_folder_id`]
//! resolves it before any folder lookup.

use crate::access::{extract_folder_id, AccessEntry, DocumentAccessView};
use crate::store::folders::get_folder_access_view;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub folder_ref: Option<Value>,
    pub created_by: Uuid,
    pub last_edited_by: Option<Uuid>,
    pub version: i32,
    pub previous_versions: Vec<Uuid>,
    pub default_access: String,
    pub archived: bool,
    pub view_count: i32,
    pub edit_count: i32,
    pub comment_count: i32,
    pub share_count: i32,
    pub viewed_by: Vec<Uuid>,
    pub favorited_by: Vec<Uuid>,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn folder_id(&self) -> Option<Uuid> {
        self.folder_ref.as_ref().and_then(extract_folder_id)
    }
}

const DOC_COLUMNS: &str = "id, title, folder_ref, created_by, last_edited_by, version, \
    previous_versions, default_access, archived, view_count, edit_count, comment_count, \
    share_count, viewed_by, favorited_by, last_viewed_at, created_at, updated_at";

fn document_from_row(row: &sqlx::postgres::PgRow) -> Document {
    Document {
        id: row.get("id"),
        title: row.get("title"),
        folder_ref: row.get("folder_ref"),
        created_by: row.get("created_by"),
        last_edited_by: row.get("last_edited_by"),
        version: row.get("version"),
        previous_versions: row.get("previous_versions"),
        default_access: row.get("default_access"),
        archived: row.get("archived"),
        view_count: row.get("view_count"),
        edit_count: row.get("edit_count"),
        comment_count: row.get("comment_count"),
        share_count: row.get("share_count"),
        viewed_by: row.get("viewed_by"),
        favorited_by: row.get("favorited_by"),
        last_viewed_at: row.get("last_viewed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn create_document(
    pool: &PgPool,
    title: &str,
    folder_id: Option<Uuid>,
    created_by: Uuid,
) -> Result<Document, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let folder_ref = folder_id.map(|f| Value::String(f.to_string()));

    sqlx::query(
        r#"
        INSERT INTO documents (id, title, folder_ref, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(&folder_ref)
    .bind(created_by)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Document {
        id,
        title: title.to_string(),
        folder_ref,
        created_by,
        last_edited_by: None,
        version: 1,
        previous_versions: Vec::new(),
        default_access: "view".to_string(),
        archived: false,
        view_count: 0,
        edit_count: 0,
        comment_count: 0,
        share_count: 0,
        viewed_by: Vec::new(),
        favorited_by: Vec::new(),
        last_viewed_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_document_by_id(
    pool: &PgPool,
    document_id: Uuid,
) -> Result<Option<Document>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {DOC_COLUMNS} FROM documents WHERE id = $1"))
        .bind(document_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(document_from_row))
}

/// Documents the user owns or collaborates on, newest first.
pub async fn list_documents_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<Document>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT d.id, d.title, d.folder_ref, d.created_by, d.last_edited_by,
               d.version, d.previous_versions, d.default_access, d.archived,
               d.view_count, d.edit_count, d.comment_count, d.share_count,
               d.viewed_by, d.favorited_by, d.last_viewed_at, d.created_at, d.updated_at
        FROM documents d
        LEFT JOIN document_access da ON da.document_id = d.id
        WHERE d.created_by = $1 OR da.user_id = $1
        ORDER BY d.updated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(document_from_row).collect())
}

pub async fn update_document_title(
    pool: &PgPool,
    document_id: Uuid,
    title: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE documents SET title = $1, updated_at = $2 WHERE id = $3")
        .bind(title)
        .bind(Utc::now())
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_archived(
    pool: &PgPool,
    document_id: Uuid,
    archived: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE documents SET archived = $1, updated_at = $2 WHERE id = $3")
        .bind(archived)
        .bind(Utc::now())
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_document(pool: &PgPool, document_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM documents WHERE id = $1")
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Atomically bump the document version, returning the new value.
pub async fn bump_version(pool: &PgPool, document_id: Uuid) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        "UPDATE documents SET version = version + 1, updated_at = $1 WHERE id = $2 RETURNING version",
    )
    .bind(Utc::now())
    .bind(document_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("version"))
}

/// Record an accepted edit: bump editCount and version, stamp the editor.
pub async fn touch_edit(
    pool: &PgPool,
    document_id: Uuid,
    editor: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE documents
        SET edit_count = edit_count + 1,
            version = version + 1,
            last_edited_by = $1,
            updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(editor)
    .bind(Utc::now())
    .bind(document_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Record a view. `view_count` counts distinct viewers, so a repeat
/// visit only refreshes `last_viewed_at`.
pub async fn track_view(pool: &PgPool, document_id: Uuid, viewer: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE documents
        SET view_count = view_count + CASE WHEN $1 = ANY(viewed_by) THEN 0 ELSE 1 END,
            viewed_by = CASE WHEN $1 = ANY(viewed_by) THEN viewed_by ELSE array_append(viewed_by, $1) END,
            last_viewed_at = $2
        WHERE id = $3
        "#,
    )
    .bind(viewer)
    .bind(Utc::now())
    .bind(document_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn track_comment(pool: &PgPool, document_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE documents SET comment_count = comment_count + 1, updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn track_share(pool: &PgPool, document_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE documents SET share_count = share_count + 1, updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(document_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn toggle_favorite(
    pool: &PgPool,
    document_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE documents
        SET favorited_by = CASE
                WHEN $1 = ANY(favorited_by) THEN array_remove(favorited_by, $1)
                ELSE array_append(favorited_by, $1)
            END
        WHERE id = $2
        RETURNING $1 = ANY(favorited_by) AS favorited
        "#,
    )
    .bind(user_id)
    .bind(document_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get("favorited"))
}

/// Add or update a per-user access entry. `access = NULL` marks a plain
/// collaborator who inherits the document's default access.
pub async fn upsert_document_collaborator(
    pool: &PgPool,
    document_id: Uuid,
    user_id: Uuid,
    access: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO document_access (document_id, user_id, access)
        VALUES ($1, $2, $3)
        ON CONFLICT (document_id, user_id) DO UPDATE SET access = EXCLUDED.access
        "#,
    )
    .bind(document_id)
    .bind(user_id)
    .bind(access)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_document_collaborator(
    pool: &PgPool,
    document_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM document_access WHERE document_id = $1 AND user_id = $2")
        .bind(document_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Append a snapshot id to the document's prior-version list.
pub async fn push_previous_version(
    pool: &PgPool,
    document_id: Uuid,
    version_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE documents SET previous_versions = array_append(previous_versions, $1) WHERE id = $2",
    )
    .bind(version_id)
    .bind(document_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Pull pruned snapshot ids out of the document's prior-version list.
pub async fn pull_previous_versions(
    pool: &PgPool,
    document_id: Uuid,
    version_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    if version_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        UPDATE documents
        SET previous_versions = ARRAY(
            SELECT v FROM unnest(previous_versions) AS v WHERE v <> ALL($1)
        )
        WHERE id = $2
        "#,
    )
    .bind(version_ids)
    .bind(document_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Assemble the view access resolution needs, following the folder
/// reference when one resolves to a live folder.
pub async fn get_document_access_view(
    pool: &PgPool,
    doc: &Document,
) -> Result<DocumentAccessView, sqlx::Error> {
    let rows = sqlx::query("SELECT user_id, access FROM document_access WHERE document_id = $1")
        .bind(doc.id)
        .fetch_all(pool)
        .await?;

    let entries = rows
        .into_iter()
        .map(|row| AccessEntry {
            user_id: row.get("user_id"),
            access: row.get("access"),
        })
        .collect();

    let folder = match doc.folder_id() {
        Some(folder_id) => get_folder_access_view(pool, folder_id).await?,
        None => None,
    };

    Ok(DocumentAccessView {
        created_by: doc.created_by,
        default_access: doc.default_access.clone(),
        entries,
        folder,
    })
}
