//! Activity log endpoints

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;
use crate::store::activity::list_activity_for_user;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

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
    let activity = list_activity_for_user(pool, user.user_id, limit).await?;
    Ok(Json(json!({ "activity": activity })))
}
