//! # Space Handlers
//!
//! Space listing, lookup, creation and the reconciliation trigger.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{GraphSpace, SpaceRecord};
use crate::web::errors::ApiResult;
use crate::web::extractors::UserToken;
use crate::web::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphSpaceList {
    pub spaces: Vec<GraphSpace>,
}

#[derive(Debug, Serialize)]
pub struct SpaceRecordList {
    pub spaces: Vec<SpaceRecord>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSpaceQuery {
    pub name: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub requeued: Vec<String>,
}

/// Managed graph spaces visible to the caller: GET /v1/spaces
pub async fn list_spaces(
    State(state): State<AppState>,
    UserToken(token): UserToken,
) -> ApiResult<Json<GraphSpaceList>> {
    let spaces = state.provisioner.list_graph_spaces(&token).await?;
    Ok(Json(GraphSpaceList { spaces }))
}

/// Subset of the given spaces that exist locally: POST /v1/spaces
pub async fn check_spaces(
    State(state): State<AppState>,
    Json(request): Json<GraphSpaceList>,
) -> ApiResult<Json<SpaceRecordList>> {
    let names: Vec<String> = request.spaces.into_iter().map(|space| space.name).collect();
    let spaces = state.provisioner.existing_spaces(&names).await?;
    Ok(Json(SpaceRecordList { spaces }))
}

/// Local space record: GET /v1/spaces/:space
pub async fn get_space(
    State(state): State<AppState>,
    Path(space): Path<String>,
) -> ApiResult<Json<SpaceRecord>> {
    Ok(Json(state.provisioner.get_space(&space).await?))
}

/// Standalone space: POST /v1/spaces/create?name&username
pub async fn create_space(
    State(state): State<AppState>,
    Query(query): Query<CreateSpaceQuery>,
) -> ApiResult<StatusCode> {
    info!(space = %query.name, creator = %query.username, "Creating standalone space");
    state
        .provisioner
        .create_standalone(&query.name, &query.username)
        .await?;
    Ok(StatusCode::CREATED)
}

/// Project space: POST /v1/spaces/create/project/:project_code
pub async fn create_space_for_project(
    State(state): State<AppState>,
    Path(project_code): Path<String>,
    UserToken(token): UserToken,
) -> ApiResult<StatusCode> {
    info!(space = %project_code, "Creating project space");
    state
        .provisioner
        .create_for_project(&project_code, &token)
        .await?;
    Ok(StatusCode::CREATED)
}

/// Dataset space: POST /v1/spaces/create/dataset/:dataset_code
pub async fn create_space_for_dataset(
    State(state): State<AppState>,
    Path(dataset_code): Path<String>,
    UserToken(token): UserToken,
) -> ApiResult<StatusCode> {
    info!(space = %dataset_code, "Creating dataset space");
    state
        .provisioner
        .create_for_dataset(&dataset_code, &token)
        .await?;
    Ok(StatusCode::CREATED)
}

/// Re-queue unprovisioned spaces: POST /v1/spaces/reconcile
pub async fn reconcile_spaces(State(state): State<AppState>) -> ApiResult<Json<ReconcileResponse>> {
    let requeued = state.provisioner.reconcile(state.reconcile_grace).await?;
    Ok(Json(ReconcileResponse { requeued }))
}
