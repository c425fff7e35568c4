//! Project API endpoints
//!
//! - GET /api/v1/projects?scope=&limit= - Published projects
//! - GET /api/v1/projects/featured - Feature projects
//! - GET /api/v1/projects/featured/random - One random feature project
//! - GET /api/v1/projects/drafts - The caller's drafts
//! - GET /api/v1/projects/{slug} - A single project
//! - GET /api/v1/users/{id} - Public profile with the user's projects

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Project, PublicUser, RelatedTo};

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    pub scope: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FeatureProjectResponse {
    pub project: Option<Project>,
}

#[derive(Debug, Serialize)]
pub struct UserProfileResponse {
    pub user: PublicUser,
    pub projects: Vec<Project>,
}

/// Build public project routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects))
        .route("/featured", get(feature_projects))
        .route("/featured/random", get(random_feature_project))
}

/// Routes that look at the viewer if there is one
pub fn viewer_router() -> Router<AppState> {
    Router::new().route("/{slug}", get(get_project))
}

/// Build protected project routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/drafts", get(list_drafts))
}

/// Build public user routes
pub fn users_router() -> Router<AppState> {
    Router::new().route("/{id}", get(get_user_profile))
}

/// GET /api/v1/projects
async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let scope = query.scope.as_deref().filter(|s| !s.is_empty());
    let projects = state.project_service.list_public(scope, query.limit).await?;
    Ok(Json(projects))
}

/// GET /api/v1/projects/featured
async fn feature_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.project_service.get_feature_projects().await?))
}

/// GET /api/v1/projects/featured/random
async fn random_feature_project(
    State(state): State<AppState>,
) -> Result<Json<FeatureProjectResponse>, ApiError> {
    let project = state.project_service.get_feature_project().await?;
    Ok(Json(FeatureProjectResponse { project }))
}

/// GET /api/v1/projects/drafts
async fn list_drafts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.project_service.get_drafts_for_user(&user.0).await?))
}

/// GET /api/v1/projects/{slug}
async fn get_project(
    State(state): State<AppState>,
    viewer: Option<AuthenticatedUser>,
    Path(slug): Path<String>,
) -> Result<Json<Project>, ApiError> {
    let viewer = viewer.map(|user| user.0);
    let project = state
        .project_service
        .get_visible(&slug, viewer.as_ref())
        .await?;
    Ok(Json(project))
}

/// GET /api/v1/users/{id}
async fn get_user_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfileResponse>, ApiError> {
    let user = state
        .user_service
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", id)))?;
    let projects = state
        .project_service
        .get_related_projects(RelatedTo::User(user.id))
        .await?;

    Ok(Json(UserProfileResponse {
        user: PublicUser::from(&user),
        projects,
    }))
}
