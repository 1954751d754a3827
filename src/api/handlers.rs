use crate::api::{parse_id, AppState};
use crate::auth::AuthUser;
use crate::error::Result;
use crate::models::{Incident, IncidentUpdate, NewIncident};
use crate::processing::IncidentPage;
use crate::search::{Pagination, PaginationParams};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Create an incident
pub async fn create_incident(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: std::result::Result<Json<NewIncident>, JsonRejection>,
) -> Result<(StatusCode, Json<Incident>)> {
    let Json(draft) = payload?;
    let created = state.processor.create_incident(draft, caller.id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Get an incident by ID
pub async fn get_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Incident>> {
    let id = parse_id(&id)?;
    Ok(Json(state.processor.get_incident(&id).await?))
}

/// List incidents
pub async fn list_incidents(
    State(state): State<AppState>,
    query: std::result::Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<IncidentPage>> {
    let Query(params) = query?;
    let page = state
        .processor
        .list_incidents(Pagination::from_params(&params))
        .await?;
    Ok(Json(page))
}

/// Search incidents by field filters and free text
pub async fn search_incidents(
    State(state): State<AppState>,
    query: std::result::Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<IncidentPage>> {
    let Query(params) = query?;
    let page = state
        .processor
        .search_incidents(&params, Pagination::from_map(&params))
        .await?;
    Ok(Json(page))
}

/// Partially update an incident
pub async fn update_incident(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<IncidentUpdate>, JsonRejection>,
) -> Result<Json<Incident>> {
    let id = parse_id(&id)?;
    let Json(update) = payload?;
    Ok(Json(
        state.processor.update_incident(&id, update, caller.id).await?,
    ))
}

/// Delete an incident
pub async fn delete_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Incident>> {
    let id = parse_id(&id)?;
    Ok(Json(state.processor.delete_incident(&id).await?))
}

/// Append a message to an incident's case discussion
pub async fn add_discussion(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<DiscussionRequest>, JsonRejection>,
) -> Result<Json<Incident>> {
    let id = parse_id(&id)?;
    let Json(request) = payload?;
    Ok(Json(
        state
            .processor
            .add_discussion(&id, &request.message, caller.id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct DiscussionRequest {
    pub message: String,
}
