//! Authentication endpoints
//!
//! `POST /api/auth/signup`, `POST /api/auth/login`, `GET /api/auth/me`.

use crate::auth::{create_token, AuthUser};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store::users::{create_user, get_user_by_email, get_user_by_id};
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default, alias = "firstName")]
    pub first_name: String,
    #[serde(default, alias = "lastName")]
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;

    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(AppError::invalid_argument("a valid email is required"));
    }
    if req.password.len() < 8 {
        return Err(AppError::invalid_argument(
            "password must be at least 8 characters",
        ));
    }

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))?;

    // the email unique index turns races into conflicts
    let user = create_user(pool, &req.first_name, &req.last_name, &req.email, &password_hash)
        .await
        .map_err(AppError::from)?;

    let token = create_token(user.id, &user.email, user.primary_role())
        .map_err(|e| AppError::internal(format!("token creation failed: {e}")))?;

    tracing::info!(user_id = %user.id, "user signed up");
    Ok(Json(json!({ "token": token, "user": user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    let pool = state.pool()?;

    let user = get_user_by_email(pool, &req.email)
        .await?
        .ok_or_else(|| AppError::unauthenticated("invalid email or password"))?;

    let ok = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|e| AppError::internal(format!("password verification failed: {e}")))?;
    if !ok {
        return Err(AppError::unauthenticated("invalid email or password"));
    }

    let token = create_token(user.id, &user.email, user.primary_role())
        .map_err(|e| AppError::internal(format!("token creation failed: {e}")))?;

    Ok(Json(json!({ "token": token, "user": user })))
}

pub async fn me(State(state): State<AppState>, AuthUser(user): AuthUser) -> AppResult<Json<Value>> {
    let pool = state.pool()?;
    let record = get_user_by_id(pool, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(json!({ "user": record })))
}
