//! Chat REST endpoints
//!
//! The socket surface carries live traffic; these endpoints cover
//! history loads and clients without an open socket.

use crate::auth::AuthUser;
use crate::chat::service::{create_or_get_conversation, mark_read, send_message};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::conversations::{
    get_conversation_by_id, list_conversations_for_user, list_messages, unread_message_count,
};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

const DEFAULT_MESSAGE_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default = "default_kind", alias = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub participants: Vec<Uuid>,
}

fn default_kind() -> String {
    "direct".to_string()
}

pub async fn create_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(mut req): Json<CreateConversationRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    if !req.participants.contains(&user.user_id) {
        req.participants.push(user.user_id);
    }
    let conversation =
        create_or_get_conversation(pool, &req.kind, req.name.as_deref(), &req.participants).await?;
    Ok(Json(json!({ "conversation": conversation })))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let conversations = list_conversations_for_user(pool, user.user_id).await?;

    let mut enriched = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let unread = unread_message_count(pool, conversation.id, user.user_id).await?;
        let mut value = serde_json::to_value(&conversation)?;
        if let Some(map) = value.as_object_mut() {
            map.insert("unreadCount".to_string(), json!(unread));
        }
        enriched.push(value);
    }

    Ok(Json(json!({ "conversations": enriched })))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<i64>,
}

pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let conversation = get_conversation_by_id(pool, conversation_id)
        .await?
        .ok_or_else(|| AppError::not_found("conversation not found"))?;
    if !conversation.participants.contains(&user.user_id) {
        return Err(AppError::forbidden("not a participant of this conversation"));
    }

    let limit = query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT).clamp(1, 200);
    let messages = list_messages(pool, conversation_id, limit).await?;
    Ok(Json(json!({ "messages": messages })))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default = "default_message_kind", alias = "type")]
    pub kind: String,
    pub metadata: Option<Value>,
}

fn default_message_kind() -> String {
    "text".to_string()
}

pub async fn post_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    if req.content.trim().is_empty() {
        return Err(AppError::invalid_argument("message content required"));
    }
    let message = send_message(
        pool,
        &state.hub,
        conversation_id,
        user.user_id,
        &req.content,
        &req.kind,
        req.metadata.as_ref(),
    )
    .await?;
    Ok(Json(json!({ "message": message })))
}

pub async fn read_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let updated = mark_read(pool, &state.hub, conversation_id, user.user_id).await?;
    Ok(Json(json!({ "updated": updated })))
}
