//! Folder endpoints

use crate::access::resolve_folder_role;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::folders::{
    create_folder, delete_folder, get_folder_access_view, get_folder_by_id, list_folders_for_user,
    remove_folder_collaborator, rename_folder, upsert_folder_collaborator,
};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

async fn require_folder_role(
    pool: &PgPool,
    folder_id: Uuid,
    user_id: Uuid,
    need_edit: bool,
) -> AppResult<()> {
    let view = get_folder_access_view(pool, folder_id)
        .await?
        .ok_or_else(|| AppError::not_found("folder not found"))?;
    let role = resolve_folder_role(&view, user_id);
    if !role.can_view() {
        return Err(AppError::not_found("folder not found"));
    }
    if need_edit && !role.can_edit() {
        return Err(AppError::forbidden("edit access required"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateFolderRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    if req.name.trim().is_empty() {
        return Err(AppError::invalid_argument("folder name required"));
    }
    let folder = create_folder(pool, &req.name, user.user_id, req.parent_id).await?;
    Ok(Json(json!({ "folder": folder })))
}

pub async fn list(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let folders = list_folders_for_user(pool, user.user_id).await?;
    Ok(Json(json!({ "folders": folders })))
}

pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(folder_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    require_folder_role(pool, folder_id, user.user_id, false).await?;
    let folder = get_folder_by_id(pool, folder_id)
        .await?
        .ok_or_else(|| AppError::not_found("folder not found"))?;
    Ok(Json(json!({ "folder": folder })))
}

#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

pub async fn rename(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(folder_id): Path<Uuid>,
    Json(req): Json<RenameFolderRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    require_folder_role(pool, folder_id, user.user_id, true).await?;
    if req.name.trim().is_empty() {
        return Err(AppError::invalid_argument("folder name required"));
    }
    rename_folder(pool, folder_id, &req.name).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Delete a folder. Contained documents are preserved; they outlive the
/// folder deliberately.
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(folder_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let folder = get_folder_by_id(pool, folder_id)
        .await?
        .ok_or_else(|| AppError::not_found("folder not found"))?;
    if folder.owner_id != user.user_id {
        return Err(AppError::forbidden("only the owner may delete a folder"));
    }
    delete_folder(pool, folder_id).await?;
    Ok(Json(json!({ "deleted": true })))
}

#[derive(Debug, Deserialize)]
pub struct FolderCollaboratorRequest {
    #[serde(alias = "userId")]
    pub user_id: Uuid,
    #[serde(default = "default_folder_access")]
    pub access: String,
}

fn default_folder_access() -> String {
    "view".to_string()
}

pub async fn add_collaborator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(folder_id): Path<Uuid>,
    Json(req): Json<FolderCollaboratorRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    require_folder_role(pool, folder_id, user.user_id, true).await?;

    // folders store `update` as their spelling of full access
    let stored = match req.access.as_str() {
        "view" => "view",
        "edit" | "update" => "update",
        other => {
            return Err(AppError::invalid_argument(format!("unknown access: {other}")));
        }
    };
    upsert_folder_collaborator(pool, folder_id, req.user_id, stored).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn remove_collaborator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((folder_id, collaborator_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    require_folder_role(pool, folder_id, user.user_id, true).await?;
    remove_folder_collaborator(pool, folder_id, collaborator_id).await?;
    Ok(Json(json!({ "ok": true })))
}
