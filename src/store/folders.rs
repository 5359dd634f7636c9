//! Folders and folder collaborators

use crate::access::{AccessEntry, FolderAccessView};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn folder_from_row(row: &sqlx::postgres::PgRow) -> Folder {
    Folder {
        id: row.get("id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        parent_id: row.get("parent_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn create_folder(
    pool: &PgPool,
    name: &str,
    owner_id: Uuid,
    parent_id: Option<Uuid>,
) -> Result<Folder, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO folders (id, name, owner_id, parent_id, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(owner_id)
    .bind(parent_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Folder {
        id,
        name: name.to_string(),
        owner_id,
        parent_id,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_folder_by_id(pool: &PgPool, folder_id: Uuid) -> Result<Option<Folder>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, name, owner_id, parent_id, created_at, updated_at FROM folders WHERE id = $1",
    )
    .bind(folder_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(folder_from_row))
}

/// Folders the user owns or collaborates on.
pub async fn list_folders_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Folder>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT f.id, f.name, f.owner_id, f.parent_id, f.created_at, f.updated_at
        FROM folders f
        LEFT JOIN folder_access fa ON fa.folder_id = f.id
        WHERE f.owner_id = $1 OR fa.user_id = $1
        ORDER BY f.updated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(folder_from_row).collect())
}

pub async fn rename_folder(pool: &PgPool, folder_id: Uuid, name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE folders SET name = $1, updated_at = $2 WHERE id = $3")
        .bind(name)
        .bind(Utc::now())
        .bind(folder_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_folder(pool: &PgPool, folder_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM folders WHERE id = $1")
        .bind(folder_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Add or update a collaborator. Folders keep `update` as the stored
/// spelling of full access.
pub async fn upsert_folder_collaborator(
    pool: &PgPool,
    folder_id: Uuid,
    user_id: Uuid,
    access: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO folder_access (folder_id, user_id, access)
        VALUES ($1, $2, $3)
        ON CONFLICT (folder_id, user_id) DO UPDATE SET access = EXCLUDED.access
        "#,
    )
    .bind(folder_id)
    .bind(user_id)
    .bind(access)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_folder_collaborator(
    pool: &PgPool,
    folder_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM folder_access WHERE folder_id = $1 AND user_id = $2")
        .bind(folder_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fetch the rows access resolution needs for a folder. Returns `None`
/// when the folder itself is gone.
pub async fn get_folder_access_view(
    pool: &PgPool,
    folder_id: Uuid,
) -> Result<Option<FolderAccessView>, sqlx::Error> {
    let Some(folder) = get_folder_by_id(pool, folder_id).await? else {
        return Ok(None);
    };

    let rows = sqlx::query("SELECT user_id, access FROM folder_access WHERE folder_id = $1")
        .bind(folder_id)
        .fetch_all(pool)
        .await?;

    let entries = rows
        .into_iter()
        .map(|row| AccessEntry {
            user_id: row.get("user_id"),
            access: row.get("access"),
        })
        .collect();

    Ok(Some(FolderAccessView {
        owner_id: folder.owner_id,
        entries,
    }))
}
