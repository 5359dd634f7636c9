//! Server configuration
//!
//! Configuration comes from environment variables with development
//! defaults. Missing services are logged and disabled rather than being
//! fatal: a server without `DATABASE_URL` still serves sockets, it just
//! cannot persist anything.

use sqlx::PgPool;
use std::time::Duration;

/// Knobs for the collaboration engine and version ledger.
///
/// The production values mirror the historical behavior (30 s auto-save,
/// 50 retained snapshots); tests shrink them.
#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// Interval between periodic content-blob saves for a live room.
    pub autosave_interval: Duration,
    /// Snapshots kept per document by `cleanup_old_versions`.
    pub version_retention: usize,
    /// Minimum spacing of presence-join notifications per (document, actor).
    pub presence_throttle: Duration,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            autosave_interval: Duration::from_secs(30),
            version_retention: 50,
            presence_throttle: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub frontend_url: String,
    pub collab: CollabConfig,
}

impl AppConfig {
    /// Read configuration from the environment.
    pub fn from_env() -> Self {
        let port = std::env::var("SERVER_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());
        Self {
            port,
            frontend_url,
            collab: CollabConfig::default(),
        }
    }
}

/// Load and initialize the database connection pool.
///
/// Reads `DATABASE_URL`, connects, and runs the embedded migrations.
/// Returns `None` on any failure so the server can start without
/// persistence; every store-backed endpoint then reports `transient`.
pub async fn load_database() -> Option<PgPool> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!("DATABASE_URL not set. Store features will be disabled.");
            return None;
        }
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPool::connect(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Store features will be disabled.");
            return None;
        }
    };

    tracing::info!("Database connection pool created");

    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed"),
        Err(e) => {
            // Migrations may have been applied out of band.
            tracing::error!("Failed to run database migrations: {:?}", e);
            tracing::warn!("Continuing; database might not be up to date");
        }
    }

    Some(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collab_defaults_match_historical_values() {
        let cfg = CollabConfig::default();
        assert_eq!(cfg.autosave_interval, Duration::from_secs(30));
        assert_eq!(cfg.version_retention, 50);
        assert_eq!(cfg.presence_throttle, Duration::from_secs(60));
    }
}
