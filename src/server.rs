//! Server initialization
//!
//! Builds the application from configuration: state, database pool,
//! background tasks, and the router.

use crate::config::{load_database, AppConfig};
use crate::routes::create_router;
use crate::state::AppState;
use axum::Router;

/// Create and configure the Axum application.
///
/// Missing services are logged and disabled rather than fatal: without
/// `DATABASE_URL` the sockets still run, persistence is just off.
pub async fn create_app(config: AppConfig) -> Router<()> {
    tracing::info!("Initializing server");

    // Step 1: Load optional services
    let db_pool = load_database().await;

    // Step 2: Create app state (hub, collaboration engine, meeting rooms)
    let app_state = AppState::new(config, db_pool);
    tracing::info!("Socket hub and collaboration engine initialized");

    // Step 3: Start the periodic auto-save task for live document rooms
    app_state.engine.spawn_autosave();

    // Step 4: Create router with all routes
    create_router(app_state)
}
