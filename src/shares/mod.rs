//! Share tokens
//!
//! Issue, validate, and revoke opaque access tokens for documents and
//! folders. Expiry is checked lazily at validation; there is no sweeper.

use crate::access::{resolve_document_role, resolve_folder_role};
use crate::error::{AppError, AppResult};
use crate::notify::{notify, NotificationKind};
use crate::store::documents::{
    get_document_access_view, get_document_by_id, track_share, upsert_document_collaborator,
};
use crate::store::folders::{get_folder_access_view, get_folder_by_id, upsert_folder_collaborator};
use crate::store::shares::{
    delete_share, get_share_by_id, get_share_by_token, insert_share, record_share_access, Share,
};
use crate::store::users::get_user_by_email;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

const SHARE_ROLES: [&str; 3] = ["view", "comment", "edit"];

pub struct IssueRequest {
    pub resource_type: String,
    pub resource_id: Uuid,
    pub role: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_public: bool,
    pub password: Option<String>,
}

/// Result of a successful validate: the share plus the denormalized
/// resource it references.
pub struct ValidateOutcome {
    pub share: Share,
    pub resource: Value,
}

/// Outcome of an invite: either an existing user was granted access, or
/// the front-end should mail a signup link.
pub enum InviteOutcome {
    Granted(Share),
    SignupRequired { signup_url: String },
}

fn check_role(role: &str) -> AppResult<()> {
    if SHARE_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(AppError::invalid_argument(format!("unknown share role: {role}")))
    }
}

/// The caller must hold edit on the resource to share it; workspace
/// administrators may share regardless of ownership.
async fn check_share_permission(
    pool: &PgPool,
    resource_type: &str,
    resource_id: Uuid,
    actor: Uuid,
    actor_is_admin: bool,
) -> AppResult<()> {
    if actor_is_admin {
        return Ok(());
    }

    let allowed = match resource_type {
        "document" => {
            let doc = get_document_by_id(pool, resource_id)
                .await?
                .ok_or_else(|| AppError::not_found("resource not found"))?;
            let view = get_document_access_view(pool, &doc).await?;
            resolve_document_role(&view, actor).can_edit()
        }
        "folder" => {
            let view = get_folder_access_view(pool, resource_id)
                .await?
                .ok_or_else(|| AppError::not_found("resource not found"))?;
            resolve_folder_role(&view, actor).can_edit()
        }
        other => {
            return Err(AppError::invalid_argument(format!(
                "unknown resource type: {other}"
            )))
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::forbidden("insufficient permissions to share"))
    }
}

/// Mint a share token. Role, expiry, visibility, and password are copied
/// verbatim (the password is stored hashed).
pub async fn issue_share(
    pool: &PgPool,
    actor: Uuid,
    actor_is_admin: bool,
    req: IssueRequest,
) -> AppResult<Share> {
    check_role(&req.role)?;
    if let Some(expires_at) = req.expires_at {
        if expires_at <= Utc::now() {
            return Err(AppError::invalid_argument("expiry must be in the future"));
        }
    }

    check_share_permission(pool, &req.resource_type, req.resource_id, actor, actor_is_admin).await?;

    let password_hash = match &req.password {
        Some(password) => Some(
            bcrypt::hash(password, bcrypt::DEFAULT_COST)
                .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?,
        ),
        None => None,
    };

    let token = Uuid::new_v4();
    let share = insert_share(
        pool,
        token,
        &req.resource_type,
        req.resource_id,
        actor,
        None,
        &req.role,
        req.expires_at,
        req.is_public,
        password_hash.as_deref(),
    )
    .await?;

    if req.resource_type == "document" {
        if let Err(e) = track_share(pool, req.resource_id).await {
            tracing::warn!("track_share failed: {:?}", e);
        }
    }

    Ok(share)
}

/// Invite a user by email. An existing user gets a per-user share row
/// plus collaborator access at the given role; an unknown address gets
/// a signup URL for the front-end to mail (the core does not deliver
/// invitation email itself).
pub async fn invite_by_email(
    pool: &PgPool,
    actor: Uuid,
    actor_is_admin: bool,
    frontend_url: &str,
    resource_type: &str,
    resource_id: Uuid,
    email: &str,
    role: &str,
) -> AppResult<InviteOutcome> {
    check_role(role)?;
    check_share_permission(pool, resource_type, resource_id, actor, actor_is_admin).await?;

    let Some(invitee) = get_user_by_email(pool, email).await? else {
        let signup_url = format!(
            "{frontend_url}/signup?resource={resource_id}&type={resource_type}&role={role}"
        );
        return Ok(InviteOutcome::SignupRequired { signup_url });
    };

    match resource_type {
        "document" => {
            upsert_document_collaborator(pool, resource_id, invitee.id, Some(role)).await?;
        }
        "folder" => {
            // folders keep `update` as their stored spelling of edit
            let stored = if role == "edit" { "update" } else { role };
            upsert_folder_collaborator(pool, resource_id, invitee.id, stored).await?;
        }
        other => {
            return Err(AppError::invalid_argument(format!(
                "unknown resource type: {other}"
            )))
        }
    }

    let token = Uuid::new_v4();
    let share = insert_share(
        pool,
        token,
        resource_type,
        resource_id,
        actor,
        Some(invitee.id),
        role,
        None,
        false,
        None,
    )
    .await?;

    if resource_type == "document" {
        if let Err(e) = track_share(pool, resource_id).await {
            tracing::warn!("track_share failed: {:?}", e);
        }
    }

    notify(
        pool,
        invitee.id,
        NotificationKind::Share,
        "Shared with you",
        &format!("A {resource_type} was shared with you"),
        json!({
            "resourceId": resource_id.to_string(),
            "resourceType": resource_type,
            "actorId": actor.to_string(),
            "role": role,
        }),
    )
    .await;

    Ok(InviteOutcome::Granted(share))
}

/// Public validation endpoint: token lookup, expiry, password, resource
/// liveness, then access accounting.
pub async fn validate_share(
    pool: &PgPool,
    token: Uuid,
    password: Option<&str>,
) -> AppResult<ValidateOutcome> {
    let share = get_share_by_token(pool, token)
        .await?
        .ok_or_else(|| AppError::not_found("invalid share token"))?;

    if let Some(expires_at) = share.expires_at {
        if expires_at < Utc::now() {
            return Err(AppError::Expired("share token has expired".to_string()));
        }
    }

    if share.is_public {
        if let Some(hash) = &share.password {
            let supplied = password.ok_or_else(|| AppError::forbidden("password required"))?;
            let ok = bcrypt::verify(supplied, hash)
                .map_err(|e| AppError::internal(format!("password verification failed: {e}")))?;
            if !ok {
                return Err(AppError::forbidden("incorrect password"));
            }
        }
    }

    let resource = load_resource(pool, &share.resource_type, share.resource_id)
        .await?
        .ok_or_else(|| AppError::Gone("shared resource no longer exists".to_string()))?;

    record_share_access(pool, share.id).await?;

    Ok(ValidateOutcome { share, resource })
}

async fn load_resource(
    pool: &PgPool,
    resource_type: &str,
    resource_id: Uuid,
) -> AppResult<Option<Value>> {
    let resource = match resource_type {
        "document" => get_document_by_id(pool, resource_id)
            .await?
            .map(|doc| serde_json::to_value(doc))
            .transpose()?,
        "folder" => get_folder_by_id(pool, resource_id)
            .await?
            .map(|folder| serde_json::to_value(folder))
            .transpose()?,
        _ => None,
    };
    Ok(resource)
}

/// Revocation: owner-only hard delete.
pub async fn revoke_share(pool: &PgPool, share_id: Uuid, actor: Uuid) -> AppResult<()> {
    let share = get_share_by_id(pool, share_id)
        .await?
        .ok_or_else(|| AppError::not_found("share not found"))?;
    if share.created_by != actor {
        return Err(AppError::forbidden("only the share owner may revoke it"));
    }
    delete_share(pool, share_id).await?;
    Ok(())
}

/// Change the role on an existing share; creator-only.
pub async fn change_share_role(
    pool: &PgPool,
    share_id: Uuid,
    actor: Uuid,
    role: &str,
) -> AppResult<()> {
    check_role(role)?;
    let share = get_share_by_id(pool, share_id)
        .await?
        .ok_or_else(|| AppError::not_found("share not found"))?;
    if share.created_by != actor {
        return Err(AppError::forbidden("only the share owner may change it"));
    }
    crate::store::shares::update_share_role(pool, share_id, role).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_validation() {
        assert!(check_role("view").is_ok());
        assert!(check_role("comment").is_ok());
        assert!(check_role("edit").is_ok());
        assert_eq!(check_role("update").unwrap_err().kind(), "invalid_argument");
        assert_eq!(check_role("").unwrap_err().kind(), "invalid_argument");
    }
}
