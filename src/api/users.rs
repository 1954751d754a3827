use crate::accounts::{LoginResponse, UserPage};
use crate::api::{parse_id, AppState};
use crate::auth::AuthUser;
use crate::error::Result;
use crate::models::{LoginRequest, RegisterRequest, UserResponse, UserUpdate};
use crate::search::{Pagination, PaginationParams};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let Json(request) = payload?;
    let user = state.users.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(request) = payload?;
    Ok(Json(state.users.login(request).await?))
}

/// Tokens are stateless; the client discards its copy
pub async fn logout(Extension(caller): Extension<AuthUser>) -> Json<MessageResponse> {
    tracing::info!(user_id = %caller.id, "User logged out");
    Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    })
}

pub async fn list_users(
    State(state): State<AppState>,
    query: std::result::Result<Query<PaginationParams>, QueryRejection>,
) -> Result<Json<UserPage>> {
    let Query(params) = query?;
    Ok(Json(
        state
            .users
            .list_users(Pagination::from_params(&params))
            .await?,
    ))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let id = parse_id(&id)?;
    Ok(Json(state.users.get_user(&id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<UserResponse>> {
    let id = parse_id(&id)?;
    let Json(update) = payload?;
    Ok(Json(state.users.update_user(&id, update, caller).await?))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    let id = parse_id(&id)?;
    Ok(Json(state.users.deactivate_user(&id, caller).await?))
}
