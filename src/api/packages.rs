//! Package API endpoints
//!
//! - GET /api/v1/packages?page=N - Paginated list, newest first
//! - POST /api/v1/packages - Create a package
//! - GET /api/v1/packages/{id} - Package detail with the projects using it
//! - GET /api/v1/packages/{id}/edit - Edit form prefill (creator only)
//! - PUT /api/v1/packages/{id} - Update (creator only)
//! - DELETE /api/v1/packages/{id} - Delete (creator only)
//! - GET /api/v1/packages/{id}/flag - Flag form context
//! - POST /api/v1/packages/{id}/flag - Flag a package for the managers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, SessionToken};
use crate::models::{
    CreatePackageInput, FlagPackageInput, Package, PagedResult, Project, RelatedTo,
    UpdatePackageInput,
};
use crate::services::FlashMessage;

/// Where the client goes after a flag submission, whatever its outcome
pub const FLAG_REDIRECT: &str = "/api/v1/packages";

#[derive(Debug, Deserialize)]
pub struct ListPackagesQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct PackageDetailResponse {
    pub package: Package,
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct FlagFormResponse {
    pub object: Package,
}

#[derive(Debug, Serialize)]
pub struct FlagResponse {
    pub message: FlashMessage,
    pub redirect: String,
}

/// Build public package routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_packages))
        .route("/{id}", get(get_package))
        .route("/{id}/flag", get(flag_form))
}

/// Build protected package routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_package))
        .route("/{id}", axum::routing::put(update_package).delete(delete_package))
        .route("/{id}/edit", get(edit_package))
        .route("/{id}/flag", post(flag_package))
}

/// GET /api/v1/packages
async fn list_packages(
    State(state): State<AppState>,
    Query(query): Query<ListPackagesQuery>,
) -> Result<Json<PagedResult<Package>>, ApiError> {
    Ok(Json(state.package_service.list(query.page).await?))
}

/// POST /api/v1/packages
async fn create_package(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreatePackageInput>,
) -> Result<(StatusCode, Json<Package>), ApiError> {
    let package = state.package_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

/// GET /api/v1/packages/{id}
async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PackageDetailResponse>, ApiError> {
    let package = state.package_service.get(id).await?;
    let projects = state
        .project_service
        .get_related_projects(RelatedTo::Package(package.id))
        .await?;

    Ok(Json(PackageDetailResponse { package, projects }))
}

/// GET /api/v1/packages/{id}/edit
async fn edit_package(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Package>, ApiError> {
    Ok(Json(state.package_service.get_for_edit(id, &user.0).await?))
}

/// PUT /api/v1/packages/{id}
async fn update_package(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePackageInput>,
) -> Result<Json<Package>, ApiError> {
    Ok(Json(state.package_service.update(id, &user.0, body).await?))
}

/// DELETE /api/v1/packages/{id}
async fn delete_package(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.package_service.delete(id, &user.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/packages/{id}/flag
async fn flag_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FlagFormResponse>, ApiError> {
    let object = state.package_service.get(id).await?;
    Ok(Json(FlagFormResponse { object }))
}

/// POST /api/v1/packages/{id}/flag
///
/// The outcome message is queued for the session and echoed in the
/// response.
async fn flag_package(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    SessionToken(token): SessionToken,
    Path(id): Path<i64>,
    Json(body): Json<FlagPackageInput>,
) -> Result<Json<FlagResponse>, ApiError> {
    let message = state.package_service.flag(id, &user.0, &body.reason).await?;
    state.flash.push(&token, message.clone()).await;

    Ok(Json(FlagResponse {
        message,
        redirect: FLAG_REDIRECT.to_string(),
    }))
}
