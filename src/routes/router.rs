//! Router configuration
//!
//! Combines every route group into one Axum router. Route groups are
//! added in order: public routes (auth entry points, share validation,
//! socket upgrades), then the token-guarded API surface, then the
//! fallback.
//!
//! Socket upgrades authenticate inside the handler (the token rides the
//! query string), so they sit outside the HTTP auth middleware.

use crate::auth::auth_middleware;
use crate::state::AppState;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{activity, auth, chat, documents, folders, meetings, notifications, shares, versions};

fn configure_document_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/documents", post(documents::create).get(documents::list))
        .route(
            "/api/documents/{id}",
            get(documents::get)
                .put(documents::update)
                .delete(documents::remove),
        )
        .route("/api/documents/{id}/duplicate", post(documents::duplicate))
        .route("/api/documents/{id}/favorite", post(documents::favorite))
        .route("/api/documents/{id}/comments", post(documents::comment))
        .route(
            "/api/documents/{id}/collaborators",
            post(documents::add_collaborator),
        )
        .route(
            "/api/documents/{id}/collaborators/{user_id}",
            delete(documents::remove_collaborator),
        )
        .route("/api/documents/{id}/content", put(documents::put_content))
        .route(
            "/api/documents/{id}/versions",
            get(versions::list).post(versions::create),
        )
        .route(
            "/api/documents/{id}/versions/{version_id}/restore",
            post(versions::restore),
        )
        .route(
            "/api/versions/{id}",
            get(versions::get).delete(versions::remove),
        )
}

fn configure_folder_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/folders", post(folders::create).get(folders::list))
        .route(
            "/api/folders/{id}",
            get(folders::get).put(folders::rename).delete(folders::remove),
        )
        .route(
            "/api/folders/{id}/collaborators",
            post(folders::add_collaborator),
        )
        .route(
            "/api/folders/{id}/collaborators/{user_id}",
            delete(folders::remove_collaborator),
        )
}

fn configure_share_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/shares", post(shares::create))
        .route("/api/shares/invite", post(shares::invite))
        .route(
            "/api/shares/resource/{id}",
            get(shares::list_for_resource),
        )
        .route(
            "/api/shares/{id}",
            put(shares::update_role).delete(shares::revoke),
        )
}

fn configure_notification_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/unread", get(notifications::unread))
        .route("/api/notifications/read-all", post(notifications::read_all))
        .route(
            "/api/notifications/{id}",
            delete(notifications::remove),
        )
        .route("/api/notifications/{id}/read", post(notifications::read_one))
}

fn configure_chat_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/api/conversations",
            post(chat::create_conversation).get(chat::list_conversations),
        )
        .route(
            "/api/conversations/{id}/messages",
            get(chat::get_messages).post(chat::post_message),
        )
        .route("/api/conversations/{id}/read", post(chat::read_conversation))
}

fn configure_meeting_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/meetings", post(meetings::create).get(meetings::list))
        .route("/api/meetings/{id}", get(meetings::get))
        .route("/api/meetings/{id}/complete", post(meetings::complete))
        .route("/api/meetings/{id}/cancel", post(meetings::cancel))
}

async fn health() -> &'static str {
    "ok"
}

/// Create the Axum router with all routes configured.
pub fn create_router(app_state: AppState) -> Router<()> {
    // Routes reachable without a token.
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/shares/validate", post(shares::validate))
        .route("/ws/docs", get(crate::collab::socket::docs_socket))
        .route("/ws/chat", get(crate::chat::socket::chat_socket))
        .route("/ws/meetings", get(crate::meetings::socket::meetings_socket));

    // The token-guarded API surface.
    let mut api = Router::new().route("/api/auth/me", get(auth::me));
    api = configure_document_routes(api);
    api = configure_folder_routes(api);
    api = configure_share_routes(api);
    api = configure_notification_routes(api);
    api = configure_chat_routes(api);
    api = configure_meeting_routes(api);
    api = api.route("/api/activity", get(activity::list));
    let api = api.layer(middleware::from_fn_with_state(
        app_state.clone(),
        auth_middleware,
    ));

    let cors = match app_state.config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
        Err(_) => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
    };

    public
        .merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .fallback(|| async { "404 Not Found" })
        .with_state(app_state)
}
