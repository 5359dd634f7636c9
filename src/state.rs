//! Shared application state

use crate::collab::CollabEngine;
use crate::config::AppConfig;
use crate::email::{default_mailer, Mailer};
use crate::meetings::MeetingRooms;
use crate::realtime::SocketHub;
use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// `None` when `DATABASE_URL` is absent; store-backed endpoints
    /// then report `transient` and sockets run without persistence.
    pub db_pool: Option<PgPool>,
    pub hub: SocketHub,
    pub engine: CollabEngine,
    pub meeting_rooms: MeetingRooms,
    pub config: AppConfig,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let hub = SocketHub::new();
        let engine = CollabEngine::new(db_pool.clone(), config.collab.clone());
        Self {
            db_pool,
            hub,
            engine,
            meeting_rooms: MeetingRooms::new(),
            config,
            mailer: default_mailer(),
        }
    }

    /// The pool, or the transient store-unavailable error.
    pub fn pool(&self) -> crate::error::AppResult<&PgPool> {
        self.db_pool
            .as_ref()
            .ok_or_else(|| crate::error::AppError::Transient("store unavailable".to_string()))
    }
}

impl FromRef<AppState> for Option<PgPool> {
    fn from_ref(state: &AppState) -> Self {
        state.db_pool.clone()
    }
}

impl FromRef<AppState> for SocketHub {
    fn from_ref(state: &AppState) -> Self {
        state.hub.clone()
    }
}

impl FromRef<AppState> for CollabEngine {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}
