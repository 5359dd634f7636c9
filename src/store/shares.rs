//! Share rows

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Share {
    pub id: Uuid,
    pub token: Uuid,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub created_by: Uuid,
    pub shared_with: Option<Uuid>,
    pub role: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_public: bool,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub access_count: i32,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

const SHARE_COLUMNS: &str = "id, token, resource_type, resource_id, created_by, shared_with, \
    role, expires_at, is_public, password, access_count, last_accessed_at, created_at";

fn share_from_row(row: &sqlx::postgres::PgRow) -> Share {
    Share {
        id: row.get("id"),
        token: row.get("token"),
        resource_type: row.get("resource_type"),
        resource_id: row.get("resource_id"),
        created_by: row.get("created_by"),
        shared_with: row.get("shared_with"),
        role: row.get("role"),
        expires_at: row.get("expires_at"),
        is_public: row.get("is_public"),
        password: row.get("password"),
        access_count: row.get("access_count"),
        last_accessed_at: row.get("last_accessed_at"),
        created_at: row.get("created_at"),
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_share(
    pool: &PgPool,
    token: Uuid,
    resource_type: &str,
    resource_id: Uuid,
    created_by: Uuid,
    shared_with: Option<Uuid>,
    role: &str,
    expires_at: Option<DateTime<Utc>>,
    is_public: bool,
    password: Option<&str>,
) -> Result<Share, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO shares (id, token, resource_type, resource_id, created_by, shared_with,
                            role, expires_at, is_public, password, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(id)
    .bind(token)
    .bind(resource_type)
    .bind(resource_id)
    .bind(created_by)
    .bind(shared_with)
    .bind(role)
    .bind(expires_at)
    .bind(is_public)
    .bind(password)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Share {
        id,
        token,
        resource_type: resource_type.to_string(),
        resource_id,
        created_by,
        shared_with,
        role: role.to_string(),
        expires_at,
        is_public,
        password: password.map(|s| s.to_string()),
        access_count: 0,
        last_accessed_at: None,
        created_at: now,
    })
}

pub async fn get_share_by_token(pool: &PgPool, token: Uuid) -> Result<Option<Share>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {SHARE_COLUMNS} FROM shares WHERE token = $1"))
        .bind(token)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(share_from_row))
}

pub async fn get_share_by_id(pool: &PgPool, share_id: Uuid) -> Result<Option<Share>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {SHARE_COLUMNS} FROM shares WHERE id = $1"))
        .bind(share_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(share_from_row))
}

pub async fn list_shares_for_resource(
    pool: &PgPool,
    resource_id: Uuid,
) -> Result<Vec<Share>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {SHARE_COLUMNS} FROM shares WHERE resource_id = $1 ORDER BY created_at DESC"
    ))
    .bind(resource_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(share_from_row).collect())
}

/// Bump accessCount and stamp lastAccessedAt after a successful validate.
pub async fn record_share_access(pool: &PgPool, share_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE shares SET access_count = access_count + 1, last_accessed_at = $1 WHERE id = $2",
    )
    .bind(Utc::now())
    .bind(share_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_share_role(pool: &PgPool, share_id: Uuid, role: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE shares SET role = $1 WHERE id = $2")
        .bind(role)
        .bind(share_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Revocation is a hard delete.
pub async fn delete_share(pool: &PgPool, share_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM shares WHERE id = $1")
        .bind(share_id)
        .execute(pool)
        .await?;
    Ok(())
}
