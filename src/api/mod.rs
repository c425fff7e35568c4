//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for ProjectHub.
//! It includes:
//! - Package endpoints (create, detail, list, edit, flag)
//! - Project endpoints (public listings, feature projects, drafts)
//! - User profile endpoints
//! - Auth endpoints
//! - Admin endpoints for projects and countries
//! - Status message endpoint

pub mod admin;
pub mod auth;
pub mod messages;
pub mod middleware;
pub mod packages;
pub mod projects;


use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, SessionToken};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/packages", packages::protected_router())
        .nest("/projects", projects::protected_router())
        .nest("/messages", messages::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Routes that adapt to the viewer when signed in
    let viewer_routes = Router::new()
        .nest("/projects", projects::viewer_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/packages", packages::public_router())
        .nest("/projects", projects::public_router())
        .nest("/users", projects::users_router())
        .merge(admin_routes)
        .merge(protected_routes)
        .merge(viewer_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);
    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => tracing::warn!("Ignoring invalid CORS origin '{}': {}", cors_origin, e),
    }

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
