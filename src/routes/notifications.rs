//! Notification endpoints

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::notifications::{
    delete_notification, list_for_user, mark_all_read, mark_read, unread_count,
};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 200);
    let notifications = list_for_user(pool, user.user_id, limit).await?;
    Ok(Json(json!({ "notifications": notifications })))
}

pub async fn unread(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let count = unread_count(pool, user.user_id).await?;
    Ok(Json(json!({ "unread": count })))
}

pub async fn read_one(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let updated = mark_read(pool, notification_id, user.user_id).await?;
    if !updated {
        return Err(AppError::not_found("notification not found"));
    }
    Ok(Json(json!({ "ok": true })))
}

pub async fn read_all(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let updated = mark_all_read(pool, user.user_id).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let deleted = delete_notification(pool, notification_id, user.user_id).await?;
    if !deleted {
        return Err(AppError::not_found("notification not found"));
    }
    Ok(Json(json!({ "deleted": true })))
}
