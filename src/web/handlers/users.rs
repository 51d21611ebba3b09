//! # User Handlers
//!
//! Collab membership of dataset spaces. Mutations are queued in the
//! background and answer 204 immediately.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::clients::CollabRole;
use crate::web::errors::ApiResult;
use crate::web::extractors::UserToken;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub role: CollabRole,
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeQuery {
    pub current_role: CollabRole,
    pub new_role: CollabRole,
}

/// GET /v1/users/:space?role
pub async fn list_users(
    State(state): State<AppState>,
    Path(space): Path<String>,
    Query(query): Query<RoleQuery>,
    UserToken(token): UserToken,
) -> ApiResult<Json<Value>> {
    let members = state
        .membership
        .list_members(&space, query.role, &token)
        .await?;
    Ok(Json(members))
}

/// POST /v1/users/:project_id/:username?role
pub async fn invite_user(
    State(state): State<AppState>,
    Path((project_id, username)): Path<(Uuid, String)>,
    Query(query): Query<RoleQuery>,
) -> ApiResult<StatusCode> {
    state
        .membership
        .invite(project_id, &username, query.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/users/:project_id/:username?role
pub async fn remove_user(
    State(state): State<AppState>,
    Path((project_id, username)): Path<(Uuid, String)>,
    Query(query): Query<RoleQuery>,
) -> ApiResult<StatusCode> {
    state
        .membership
        .remove(project_id, &username, query.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/users/:project_id/:username?current_role&new_role
pub async fn update_user(
    State(state): State<AppState>,
    Path((project_id, username)): Path<(Uuid, String)>,
    Query(query): Query<RoleChangeQuery>,
) -> ApiResult<StatusCode> {
    state
        .membership
        .update(project_id, &username, query.current_role, query.new_role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
