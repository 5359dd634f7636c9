//! Version ledger endpoints

use crate::access::resolve_document_role;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::documents::{get_document_access_view, get_document_by_id};
use crate::versioning;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

async fn require_document_role(
    pool: &PgPool,
    document_id: Uuid,
    user_id: Uuid,
    need_edit: bool,
) -> AppResult<()> {
    let doc = get_document_by_id(pool, document_id)
        .await?
        .ok_or_else(|| AppError::not_found("document not found"))?;
    let view = get_document_access_view(pool, &doc).await?;
    let role = resolve_document_role(&view, user_id);
    if !role.can_view() {
        return Err(AppError::not_found("document not found"));
    }
    if need_edit && !role.can_edit() {
        return Err(AppError::forbidden("edit access required"));
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    require_document_role(pool, document_id, user.user_id, false).await?;
    let versions = versioning::get_versions(pool, document_id).await?;
    Ok(Json(json!({ "versions": versions })))
}

pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(version_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let version = versioning::get_version(pool, version_id).await?;
    require_document_role(pool, version.document_id, user.user_id, false).await?;
    Ok(Json(json!({ "version": version })))
}

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub content: String,
    pub description: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
    Json(req): Json<CreateVersionRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    require_document_role(pool, document_id, user.user_id, true).await?;

    let version = versioning::create_version(
        pool,
        document_id,
        &req.content,
        user.user_id,
        req.description.as_deref(),
    )
    .await?;

    let retention = state.config.collab.version_retention;
    if let Err(e) = versioning::cleanup_old_versions(pool, document_id, retention).await {
        tracing::warn!("version cleanup failed: {:?}", e);
    }

    Ok(Json(json!({ "version": version })))
}

pub async fn restore(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((document_id, version_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    require_document_role(pool, document_id, user.user_id, true).await?;

    let outcome = versioning::restore_version(
        pool,
        document_id,
        version_id,
        user.user_id,
        state.config.collab.version_retention,
    )
    .await?;

    Ok(Json(json!({
        "newVersion": outcome.new_version,
        "restoredContent": outcome.restored_content,
    })))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(version_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let version = versioning::get_version(pool, version_id).await?;
    require_document_role(pool, version.document_id, user.user_id, true).await?;
    versioning::remove_version(pool, version_id, user.user_id).await?;
    Ok(Json(json!({ "deleted": true })))
}
