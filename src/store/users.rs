//! User accounts

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Vec<String>,
    pub avatar: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let trimmed = name.trim();
        if trimmed.is_empty() {
            self.email.clone()
        } else {
            trimmed.to_string()
        }
    }

    /// Primary workspace role for token claims.
    pub fn primary_role(&self) -> &str {
        if self.roles.iter().any(|r| r == "administrator") {
            "administrator"
        } else {
            "regular"
        }
    }
}

/// Minimal user attributes embedded in denormalized views (message
/// senders, version authors, presence lists).
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar: Option<String>,
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> User {
    User {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        roles: row.get("roles"),
        avatar: row.get("avatar"),
        verified: row.get("verified"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password_hash, roles, avatar, verified, created_at, updated_at";

/// Create a new user account. The email unique index rejects duplicates.
pub async fn create_user(
    pool: &PgPool,
    first_name: &str,
    last_name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO users (id, first_name, last_name, email, password_hash, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        "#,
    )
    .bind(id)
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(User {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        roles: vec!["regular".to_string()],
        avatar: None,
        verified: false,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(user_from_row))
}

pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.as_ref().map(user_from_row))
}

/// Fetch summaries for a set of users, e.g. to populate version authors.
pub async fn get_user_summaries(
    pool: &PgPool,
    user_ids: &[Uuid],
) -> Result<Vec<UserSummary>, sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT id, first_name, last_name, email, avatar
        FROM users
        WHERE id = ANY($1)
        "#,
    )
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| UserSummary {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            avatar: row.get("avatar"),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str, email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: first.into(),
            last_name: last.into(),
            email: email.into(),
            password_hash: "x".into(),
            roles: vec!["regular".into()],
            avatar: None,
            verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let u = user("", "", "a@b.c");
        assert_eq!(u.display_name(), "a@b.c");
        let u = user("Ada", "Lovelace", "ada@example.com");
        assert_eq!(u.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_primary_role() {
        let mut u = user("A", "B", "a@b.c");
        assert_eq!(u.primary_role(), "regular");
        u.roles.push("administrator".into());
        assert_eq!(u.primary_role(), "administrator");
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let u = user("A", "B", "a@b.c");
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(json.contains("a@b.c"));
    }
}
