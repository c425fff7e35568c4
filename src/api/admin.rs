//! Admin API endpoints
//!
//! All routes require the admin role.
//! - GET /api/v1/admin/projects?is_active= - Project list rows
//! - POST /api/v1/admin/projects - Create project
//! - GET /api/v1/admin/projects/{id} - Get project
//! - PUT /api/v1/admin/projects/{id} - Update project
//! - DELETE /api/v1/admin/projects/{id} - Delete project
//! - GET /api/v1/admin/countries - List countries
//! - POST /api/v1/admin/countries - Create country
//! - PUT /api/v1/admin/countries/{id} - Update country
//! - DELETE /api/v1/admin/countries/{id} - Delete country

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    Country, CreateCountryInput, CreateProjectInput, Project, ProjectSummary, UpdateCountryInput,
    UpdateProjectInput,
};

#[derive(Debug, Deserialize)]
pub struct AdminProjectsQuery {
    pub is_active: Option<bool>,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/countries", get(list_countries).post(create_country))
        .route("/countries/{id}", put(update_country).delete(delete_country))
}

/// GET /api/v1/admin/projects
async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<AdminProjectsQuery>,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    Ok(Json(state.project_service.admin_list(query.is_active).await?))
}

/// POST /api/v1/admin/projects
async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<CreateProjectInput>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.project_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/v1/admin/projects/{id}
async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.project_service.get(id).await?))
}

/// PUT /api/v1/admin/projects/{id}
async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateProjectInput>,
) -> Result<Json<Project>, ApiError> {
    Ok(Json(state.project_service.update(id, body).await?))
}

/// DELETE /api/v1/admin/projects/{id}
async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.project_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/countries
async fn list_countries(State(state): State<AppState>) -> Result<Json<Vec<Country>>, ApiError> {
    Ok(Json(state.country_service.list().await?))
}

/// POST /api/v1/admin/countries
async fn create_country(
    State(state): State<AppState>,
    Json(body): Json<CreateCountryInput>,
) -> Result<(StatusCode, Json<Country>), ApiError> {
    let country = state.country_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(country)))
}

/// PUT /api/v1/admin/countries/{id}
async fn update_country(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCountryInput>,
) -> Result<Json<Country>, ApiError> {
    Ok(Json(state.country_service.update(id, body).await?))
}

/// DELETE /api/v1/admin/countries/{id}
async fn delete_country(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.country_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
