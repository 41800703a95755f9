//! Router configuration for the Stratus API.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{auth, file, AppState};

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/register/verify", post(auth::register_verify))
        .route("/login", post(auth::login))
        .route("/login/verify", post(auth::login_verify))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let account_routes = Router::new()
        .route("/delete", post(auth::delete_request))
        .route("/delete/confirm", post(auth::delete_confirm));

    // Quota enforcement happens per user; the transport limit only guards
    // against unbounded request bodies.
    let file_routes = Router::new()
        .route("/", post(file::upload))
        .route("/:id", get(file::download))
        .layer(DefaultBodyLimit::max(64 * 1024 * 1024));

    let folder_routes = Router::new()
        .route("/", get(file::list_root).post(file::create_folder))
        .route("/:id", get(file::list_folder));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/account", account_routes)
        .nest("/files", file_routes)
        .nest("/folders", folder_routes);

    Router::new()
        .nest("/api", api_routes)
        .merge(create_health_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
