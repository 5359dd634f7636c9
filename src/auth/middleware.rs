//! Authentication middleware
//!
//! Extracts and verifies bearer tokens, attaching the authenticated user
//! to request extensions for handlers. Socket upgrades reuse the same
//! extraction: Authorization header first, `token` query parameter as the
//! fallback for browser WebSocket clients that cannot set headers.

use crate::auth::sessions::verify_token;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Authenticated user data extracted from a verified token.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == "administrator"
    }
}

/// Pull a bearer token out of the Authorization header, falling back to
/// the `token` query parameter.
pub fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }

    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("token=").map(|v| v.to_string())
        })
    })
}

/// Verify a raw token string and produce the authenticated user.
pub fn authenticate_token(token: &str) -> Result<AuthenticatedUser, AppError> {
    let claims = verify_token(token).map_err(|e| {
        tracing::warn!("Invalid token: {:?}", e);
        AppError::unauthenticated("invalid or expired token")
    })?;

    let user_id = claims
        .user_id()
        .map_err(|e| AppError::unauthenticated(e))?;

    Ok(AuthenticatedUser {
        user_id,
        email: claims.email,
        role: claims.role,
    })
}

/// Authentication middleware for protected REST routes.
///
/// Verifies the token and attaches [`AuthenticatedUser`] to request
/// extensions. Responds 401 when the token is missing or invalid.
pub async fn auth_middleware(
    State(_app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let token = extract_token(&parts).ok_or_else(|| {
        tracing::warn!("Missing Authorization header");
        AppError::unauthenticated("missing credentials")
    })?;

    let user = authenticate_token(&token)?;
    parts.extensions.insert(user);
    request = Request::from_parts(parts, body);

    Ok(next.run(request).await)
}

/// Axum extractor for the authenticated user set by [`auth_middleware`].
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl axum::extract::FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("AuthenticatedUser not found in request extensions");
                AppError::unauthenticated("missing credentials")
            })?;

        Ok(AuthUser(user))
    }
}

/// Extractor for socket upgrades, which bypass [`auth_middleware`]:
/// verifies the credential directly from header or query.
#[derive(Clone, Debug)]
pub struct SocketAuth(pub AuthenticatedUser);

impl axum::extract::FromRequestParts<AppState> for SocketAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)
            .ok_or_else(|| AppError::unauthenticated("missing credentials"))?;
        Ok(SocketAuth(authenticate_token(&token)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::sessions::create_token;
    use axum::http::Request;

    fn parts_for(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_extract_token_from_header() {
        let parts = parts_for("http://example.com/api/docs", Some("Bearer abc123"));
        assert_eq!(extract_token(&parts).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extract_token_from_query() {
        let parts = parts_for("http://example.com/ws/docs?token=xyz&foo=1", None);
        assert_eq!(extract_token(&parts).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_header_wins_over_query() {
        let parts = parts_for("http://example.com/ws/docs?token=query", Some("Bearer header"));
        assert_eq!(extract_token(&parts).as_deref(), Some("header"));
    }

    #[test]
    fn test_extract_token_missing() {
        let parts = parts_for("http://example.com/api/docs", None);
        assert!(extract_token(&parts).is_none());
    }

    #[test]
    fn test_authenticate_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "a@b.c", "regular").unwrap();
        let user = authenticate_token(&token).unwrap();
        assert_eq!(user.user_id, user_id);
        assert!(!user.is_admin());
    }

    #[test]
    fn test_authenticate_garbage_token() {
        let err = authenticate_token("not-a-jwt").unwrap_err();
        assert_eq!(err.kind(), "unauthenticated");
    }
}
