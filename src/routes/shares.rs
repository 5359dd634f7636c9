//! Share endpoints
//!
//! `POST /api/shares` mints a token, `POST /api/shares/invite` grants by
//! email, `POST /api/shares/validate` is public (token holders are not
//! authenticated users yet), the rest are creator-scoped management.

use crate::auth::AuthUser;
use crate::email::OutboundEmail;
use crate::error::AppResult;
use crate::shares::{
    change_share_role, invite_by_email, issue_share, revoke_share, validate_share, InviteOutcome,
    IssueRequest,
};
use crate::state::AppState;
use crate::store::shares::list_shares_for_resource;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    #[serde(alias = "resourceType")]
    pub resource_type: String,
    #[serde(alias = "resourceId")]
    pub resource_id: Uuid,
    #[serde(default = "default_share_role")]
    pub role: String,
    #[serde(default, alias = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "isPublic")]
    pub is_public: bool,
    pub password: Option<String>,
}

fn default_share_role() -> String {
    "view".to_string()
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<CreateShareRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let share = issue_share(
        pool,
        user.user_id,
        user.is_admin(),
        IssueRequest {
            resource_type: req.resource_type,
            resource_id: req.resource_id,
            role: req.role,
            expires_at: req.expires_at,
            is_public: req.is_public,
            password: req.password,
        },
    )
    .await?;
    Ok(Json(json!({ "share": share })))
}

#[derive(Debug, Deserialize)]
pub struct InviteRequest {
    #[serde(alias = "resourceType")]
    pub resource_type: String,
    #[serde(alias = "resourceId")]
    pub resource_id: Uuid,
    pub email: String,
    #[serde(default = "default_share_role")]
    pub role: String,
}

pub async fn invite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<InviteRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let outcome = invite_by_email(
        pool,
        user.user_id,
        user.is_admin(),
        &state.config.frontend_url,
        &req.resource_type,
        req.resource_id,
        &req.email,
        &req.role,
    )
    .await?;

    let body = match outcome {
        InviteOutcome::Granted(share) => json!({ "share": share }),
        InviteOutcome::SignupRequired { signup_url } => {
            state.mailer.send(OutboundEmail {
                to: req.email.clone(),
                subject: format!("You have been invited to a {}", req.resource_type),
                html: format!(
                    "<p>You have been invited to collaborate. <a href=\"{signup_url}\">Sign up</a> to accept.</p>"
                ),
                text: Some(format!("Sign up to accept the invitation: {signup_url}")),
            });
            json!({ "signupUrl": signup_url })
        }
    };
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub token: Uuid,
    pub password: Option<String>,
}

/// Public endpoint; no auth middleware.
pub async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let outcome = validate_share(pool, req.token, req.password.as_deref()).await?;
    Ok(Json(json!({
        "share": outcome.share,
        "resource": outcome.resource,
    })))
}

pub async fn list_for_resource(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(resource_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let shares = list_shares_for_resource(pool, resource_id).await?;
    Ok(Json(json!({ "shares": shares })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateShareRequest {
    pub role: String,
}

pub async fn update_role(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(share_id): Path<Uuid>,
    Json(req): Json<UpdateShareRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    change_share_role(pool, share_id, user.user_id, &req.role).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn revoke(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(share_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    revoke_share(pool, share_id, user.user_id).await?;
    Ok(Json(json!({ "revoked": true })))
}
