//! Session tokens
//!
//! JWT bearer tokens carrying `{id, email, role}` with a 1-day lifetime.
//! Historical clients sent the user id under `_id` or `userId`; inbound
//! decoding accepts all three spellings.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Token lifetime in seconds (1 day).
const TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Canonical user identifier; `_id` and `userId` accepted inbound.
    #[serde(alias = "_id", alias = "userId")]
    pub id: String,
    pub email: String,
    /// Workspace role (`regular` or `administrator`).
    #[serde(default = "default_role")]
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

fn default_role() -> String {
    "regular".to_string()
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, String> {
        Uuid::parse_str(&self.id).map_err(|e| format!("invalid user id in token: {e}"))
    }

    pub fn is_admin(&self) -> bool {
        self.role == "administrator"
    }
}

fn get_jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set, using development default");
        "change-me-in-production".to_string()
    })
}

/// Create a signed token for a user.
pub fn create_token(
    user_id: Uuid,
    email: &str,
    role: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs();

    let claims = Claims {
        id: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: now + TOKEN_TTL_SECS,
        iat: now,
    };

    let key = EncodingKey::from_secret(get_jwt_secret().as_ref());
    encode(&Header::default(), &claims, &key)
}

/// Verify and decode a token.
pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(get_jwt_secret().as_ref());
    let validation = Validation::default();
    let token_data = decode::<Claims>(token, &key, &validation)?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_verify_token() {
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "test@example.com", "regular").unwrap();
        assert!(!token.is_empty());

        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert!(!claims.is_admin());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_lifetime_is_one_day() {
        let token = create_token(Uuid::new_v4(), "a@b.c", "regular").unwrap();
        let claims = verify_token(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    }

    #[test]
    fn test_admin_role() {
        let token = create_token(Uuid::new_v4(), "admin@example.com", "administrator").unwrap();
        let claims = verify_token(&token).unwrap();
        assert!(claims.is_admin());
    }

    #[test]
    fn test_verify_invalid_token() {
        assert!(verify_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_inbound_id_aliases() {
        // Legacy clients minted payloads with `_id` or `userId`.
        let id = Uuid::new_v4();
        for key in ["id", "_id", "userId"] {
            let json = format!(
                r#"{{"{key}":"{id}","email":"a@b.c","exp":9999999999,"iat":0}}"#
            );
            let claims: Claims = serde_json::from_str(&json).unwrap();
            assert_eq!(claims.user_id().unwrap(), id);
            assert_eq!(claims.role, "regular");
        }
    }
}
