//! Append-only activity trail

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub details: Option<Value>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub device: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request context attached to a log entry when available.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub device: Option<String>,
}

pub async fn log_activity(
    pool: &PgPool,
    user_id: Uuid,
    action: &str,
    resource_type: Option<&str>,
    resource_id: Option<Uuid>,
    details: Option<&Value>,
    ctx: &RequestContext,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO activity_logs (id, user_id, action, resource_type, resource_id,
                                   details, ip, user_agent, device, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(details)
    .bind(&ctx.ip)
    .bind(&ctx.user_agent)
    .bind(&ctx.device)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_activity_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<ActivityLog>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, action, resource_type, resource_id, details,
               ip, user_agent, device, created_at
        FROM activity_logs
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ActivityLog {
            id: row.get("id"),
            user_id: row.get("user_id"),
            action: row.get("action"),
            resource_type: row.get("resource_type"),
            resource_id: row.get("resource_id"),
            details: row.get("details"),
            ip: row.get("ip"),
            user_agent: row.get("user_agent"),
            device: row.get("device"),
            created_at: row.get("created_at"),
        })
        .collect())
}
