//! Meeting endpoints
//!
//! Scheduling and lifecycle management; the live room itself is served
//! over the meetings socket.

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::meetings::service::schedule_meeting;
use crate::state::AppState;
use crate::store::meetings::{
    cancel_meeting, complete_meeting, get_meeting_by_id, list_meetings_for_user,
};
use crate::store::users::get_user_summaries;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateMeetingRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(alias = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(default, alias = "endTime")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub participants: Vec<Uuid>,
    #[serde(default, alias = "documentId")]
    pub doc_id: Option<Uuid>,
    #[serde(default, alias = "folderId")]
    pub folder_id: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateMeetingRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let meeting = schedule_meeting(
        pool,
        &req.title,
        req.description.as_deref(),
        req.start_time,
        req.end_time,
        &req.participants,
        user.user_id,
        req.doc_id,
        req.folder_id,
    )
    .await?;
    Ok(Json(json!({ "meeting": meeting })))
}

pub async fn list(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let meetings = list_meetings_for_user(pool, user.user_id).await?;
    Ok(Json(json!({ "meetings": meetings })))
}

pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(meeting_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let meeting = get_meeting_by_id(pool, meeting_id)
        .await?
        .ok_or_else(|| AppError::not_found("meeting not found"))?;
    if !meeting.allows(user.user_id) {
        return Err(AppError::not_found("meeting not found"));
    }
    let participants = get_user_summaries(pool, &meeting.participants).await?;
    Ok(Json(json!({ "meeting": meeting, "participants": participants })))
}

pub async fn complete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(meeting_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let meeting = get_meeting_by_id(pool, meeting_id)
        .await?
        .ok_or_else(|| AppError::not_found("meeting not found"))?;
    if meeting.created_by != user.user_id {
        return Err(AppError::forbidden("only the creator may end a meeting"));
    }
    let duration_minutes = (Utc::now() - meeting.start_time).num_minutes().max(0) as i32;
    complete_meeting(pool, meeting_id, duration_minutes).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn cancel(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(meeting_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let meeting = get_meeting_by_id(pool, meeting_id)
        .await?
        .ok_or_else(|| AppError::not_found("meeting not found"))?;
    if meeting.created_by != user.user_id {
        return Err(AppError::forbidden("only the creator may cancel a meeting"));
    }
    cancel_meeting(pool, meeting_id).await?;
    Ok(Json(json!({ "ok": true })))
}
