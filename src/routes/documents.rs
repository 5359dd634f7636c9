//! Document endpoints

use crate::access::resolve_document_role;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::notify::{notify_document_activity, NotificationKind};
use crate::state::AppState;
use crate::store::activity::{log_activity, RequestContext};
use crate::store::content::{latest_for_document, save_content};
use crate::store::documents::{
    create_document, delete_document, get_document_access_view, get_document_by_id,
    list_documents_for_user, remove_document_collaborator, set_archived, toggle_favorite,
    track_comment, track_view, update_document_title, upsert_document_collaborator, Document,
};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

/// Load a document and require the caller hold at least `view`
/// (optionally `edit`). Resolution to `none` reads as absence.
async fn load_authorized(
    pool: &PgPool,
    document_id: Uuid,
    user_id: Uuid,
    need_edit: bool,
) -> AppResult<Document> {
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
    Ok(doc)
}

/// Owner-only operations reject everyone else, edit access included.
fn require_owner(doc: &Document, user_id: Uuid, action: &str) -> AppResult<()> {
    if doc.created_by != user_id {
        return Err(AppError::forbidden(format!("only the owner may {action}")));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    #[serde(default, alias = "folderId")]
    pub folder_id: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateDocumentRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    if req.title.trim().is_empty() {
        return Err(AppError::invalid_argument("title required"));
    }

    let doc = create_document(pool, &req.title, req.folder_id, user.user_id).await?;
    log_activity(
        pool,
        user.user_id,
        "document_created",
        Some("document"),
        Some(doc.id),
        None,
        &RequestContext::default(),
    )
    .await
    .ok();

    Ok(Json(json!({ "document": doc })))
}

pub async fn list(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let docs = list_documents_for_user(pool, user.user_id).await?;
    Ok(Json(json!({ "documents": docs })))
}

/// Fetch a document with its current content; records a view.
pub async fn get(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let doc = load_authorized(pool, document_id, user.user_id, false).await?;

    let content = latest_for_document(pool, document_id)
        .await?
        .map(|blob| blob.content);

    track_view(pool, document_id, user.user_id).await?;
    if doc.created_by != user.user_id {
        notify_document_activity(
            pool,
            doc.created_by,
            user.user_id,
            &user.email,
            NotificationKind::DocumentViewed,
            document_id,
            &doc.title,
        )
        .await;
    }

    Ok(Json(json!({ "document": doc, "content": content })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub archived: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
    Json(req): Json<UpdateDocumentRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    load_authorized(pool, document_id, user.user_id, true).await?;

    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(AppError::invalid_argument("title cannot be empty"));
        }
        update_document_title(pool, document_id, title).await?;
    }
    if let Some(archived) = req.archived {
        set_archived(pool, document_id, archived).await?;
    }

    let doc = get_document_by_id(pool, document_id)
        .await?
        .ok_or_else(|| AppError::not_found("document not found"))?;
    Ok(Json(json!({ "document": doc })))
}

pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let doc = load_authorized(pool, document_id, user.user_id, true).await?;
    require_owner(&doc, user.user_id, "delete a document")?;
    delete_document(pool, document_id).await?;
    log_activity(
        pool,
        user.user_id,
        "document_deleted",
        Some("document"),
        Some(document_id),
        None,
        &RequestContext::default(),
    )
    .await
    .ok();
    Ok(Json(json!({ "deleted": true })))
}

/// Copy a document: same content, fresh history and counters.
pub async fn duplicate(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let source = load_authorized(pool, document_id, user.user_id, false).await?;
    require_owner(&source, user.user_id, "duplicate a document")?;

    let copy = create_document(
        pool,
        &format!("{} (copy)", source.title),
        source.folder_id(),
        user.user_id,
    )
    .await?;

    if let Some(blob) = latest_for_document(pool, document_id).await? {
        save_content(pool, copy.id, &blob.content).await?;
    }

    Ok(Json(json!({ "document": copy })))
}

pub async fn favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    load_authorized(pool, document_id, user.user_id, false).await?;
    let favorited = toggle_favorite(pool, document_id, user.user_id).await?;
    Ok(Json(json!({ "favorited": favorited })))
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

/// Record a comment: bump the counter and notify the owner. Comment
/// bodies live with the front-end document model, not here.
pub async fn comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let doc = load_authorized(pool, document_id, user.user_id, false).await?;
    if req.text.trim().is_empty() {
        return Err(AppError::invalid_argument("comment text required"));
    }

    track_comment(pool, document_id).await?;
    notify_document_activity(
        pool,
        doc.created_by,
        user.user_id,
        &user.email,
        NotificationKind::DocumentCommented,
        document_id,
        &doc.title,
    )
    .await;

    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct CollaboratorRequest {
    #[serde(alias = "userId")]
    pub user_id: Uuid,
    pub access: Option<String>,
}

pub async fn add_collaborator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
    Json(req): Json<CollaboratorRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    load_authorized(pool, document_id, user.user_id, true).await?;

    if let Some(access) = &req.access {
        // legacy spellings are accepted on write and normalized on read
        if !["view", "edit", "update", "comment"].contains(&access.as_str()) {
            return Err(AppError::invalid_argument(format!("unknown access: {access}")));
        }
    }

    upsert_document_collaborator(pool, document_id, req.user_id, req.access.as_deref()).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn remove_collaborator(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((document_id, collaborator_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let doc = load_authorized(pool, document_id, user.user_id, true).await?;
    require_owner(&doc, user.user_id, "remove collaborators")?;
    remove_document_collaborator(pool, document_id, collaborator_id).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct SaveContentRequest {
    pub content: String,
}

/// Explicit content write outside a live room.
pub async fn put_content(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(document_id): Path<Uuid>,
    Json(req): Json<SaveContentRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let doc = load_authorized(pool, document_id, user.user_id, true).await?;
    let blob = save_content(pool, document_id, &req.content).await?;
    if doc.created_by != user.user_id {
        notify_document_activity(
            pool,
            doc.created_by,
            user.user_id,
            &user.email,
            NotificationKind::DocumentEdited,
            document_id,
            &doc.title,
        )
        .await;
    }
    Ok(Json(json!({ "content": blob })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc_owned_by(owner: Uuid) -> Document {
        let now = Utc::now();
        Document {
            id: Uuid::new_v4(),
            title: "notes".to_string(),
            folder_ref: None,
            created_by: owner,
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
        }
    }

    #[test]
    fn test_owner_passes_owner_gate() {
        let owner = Uuid::new_v4();
        let doc = doc_owned_by(owner);
        assert!(require_owner(&doc, owner, "delete a document").is_ok());
    }

    #[test]
    fn test_editor_fails_owner_gate() {
        // an edit-level collaborator is still not the owner; duplication
        // and collaborator removal stay owner-only
        let doc = doc_owned_by(Uuid::new_v4());
        let editor = Uuid::new_v4();

        let err = require_owner(&doc, editor, "duplicate a document").unwrap_err();
        assert_eq!(err.kind(), "forbidden");
        let err = require_owner(&doc, editor, "remove collaborators").unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }
}
