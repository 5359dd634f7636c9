//! Application error type
//!
//! One error enum covers the whole server. Each variant is an error *kind*
//! rather than a source-specific type; handlers convert kinds to HTTP
//! statuses, socket handlers forward the message as an `error` frame.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Server-wide error kinds.
#[derive(Debug, Error)]
pub enum AppError {
    /// No credential, or the credential failed verification.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller resolved to no usable role for a mutating operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing resource, or a resource the caller may not know exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique-index violation (user email, share token).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bad enum value, missing required field, malformed id.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Share token past its expiry.
    #[error("expired: {0}")]
    Expired(String),

    /// Resource deleted under an active share.
    #[error("gone: {0}")]
    Gone(String),

    /// Store unavailable; retried internally where possible.
    #[error("transient: {0}")]
    Transient(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status for this kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Expired(_) => StatusCode::GONE,
            Self::Gone(_) => StatusCode::GONE,
            Self::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind name for the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Expired(_) => "expired",
            Self::Gone(_) => "gone",
            Self::Transient(_) => "transient",
            Self::Internal(_) => "internal",
        }
    }

    /// Human-readable message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthenticated(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::InvalidArgument(m)
            | Self::Expired(m)
            | Self::Gone(m)
            | Self::Transient(m)
            | Self::Internal(m) => m,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("record not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::Transient(err.to_string())
            }
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {err}"))
    }
}

/// Structured error body; no stack traces cross the wire.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = Json(serde_json::json!({
            "error": self.kind(),
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            AppError::unauthenticated("no token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::forbidden("nope").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::Expired("share".into()).status_code(),
            StatusCode::GONE
        );
        assert_eq!(
            AppError::Transient("db down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(AppError::Conflict("dup".into()).kind(), "conflict");
        assert_eq!(AppError::not_found("doc").kind(), "not_found");
        assert_eq!(AppError::Gone("deleted".into()).kind(), "gone");
    }

    #[test]
    fn test_message_strips_kind() {
        let err = AppError::forbidden("insufficient permissions");
        assert_eq!(err.message(), "insufficient permissions");
        assert!(err.to_string().starts_with("forbidden:"));
    }

    #[test]
    fn test_from_row_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), "not_found");
    }
}
