//! # Metadata Handlers
//!
//! Listing, import from the graph, upload/update into the graph, refresh and
//! delete of metadata instances.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{KgInstance, MetadataRecord, Stage};
use crate::orchestration::metadata_sync::UploadRequest;
use crate::web::errors::ApiResult;
use crate::web::extractors::UserToken;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListMetadataQuery {
    pub space: String,
    #[serde(rename = "type")]
    pub instance_type: String,
    pub stage: Stage,
}

#[derive(Debug, Serialize)]
pub struct InstanceList {
    pub result: Vec<KgInstance>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MetadataQueryList {
    pub metadata: Vec<MetadataQuery>,
}

#[derive(Debug, Serialize)]
pub struct MetadataRecordList {
    pub metadata: Vec<MetadataRecord>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub uploader: String,
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub space: String,
    pub metadata_id: Uuid,
    pub dataset_id: Uuid,
    pub uploader: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuery {
    pub space: String,
    pub filename: String,
    pub dataset_id: Uuid,
    pub uploader: String,
}

/// Graph instances of a type: GET /v1/metadata?space&type&stage
pub async fn list_metadata(
    State(state): State<AppState>,
    Query(query): Query<ListMetadataQuery>,
    UserToken(token): UserToken,
) -> ApiResult<Json<InstanceList>> {
    let result = state
        .metadata
        .list_instances(&query.space, &query.instance_type, query.stage, &token)
        .await?;
    Ok(Json(InstanceList { result }))
}

/// Which of the given references were uploaded: POST /v1/metadata
pub async fn check_metadata(
    State(state): State<AppState>,
    Json(request): Json<MetadataQueryList>,
) -> ApiResult<Json<MetadataRecordList>> {
    let ids: Vec<Uuid> = request.metadata.iter().map(|query| query.id).collect();
    let metadata = state.metadata.uploaded(&ids).await?;
    Ok(Json(MetadataRecordList { metadata }))
}

/// GET /v1/metadata/:metadata_id
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(metadata_id): Path<Uuid>,
    UserToken(token): UserToken,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.metadata.get_instance(metadata_id, &token).await?))
}

/// Import a graph instance into a dataset:
/// GET /v1/metadata/upload/:kg_instance_id/:dataset_id?uploader&filename
pub async fn download_metadata(
    State(state): State<AppState>,
    Path((kg_instance_id, dataset_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<DownloadQuery>,
    UserToken(token): UserToken,
) -> ApiResult<Json<Value>> {
    let schema = state
        .metadata
        .download(
            kg_instance_id,
            dataset_id,
            &query.uploader,
            query.filename.as_deref(),
            &token,
        )
        .await?;
    Ok(Json(schema))
}

/// GET /v1/metadata/refresh/:metadata_id?username
pub async fn refresh_metadata(
    State(state): State<AppState>,
    Path(metadata_id): Path<Uuid>,
    Query(query): Query<UsernameQuery>,
    UserToken(token): UserToken,
) -> ApiResult<Json<Value>> {
    let refreshed = state
        .metadata
        .refresh(metadata_id, &query.username, &token)
        .await?;
    Ok(Json(refreshed))
}

/// GET /v1/metadata/refresh/dataset/:dataset_id?username
pub async fn refresh_dataset_metadata(
    State(state): State<AppState>,
    Path(dataset_id): Path<Uuid>,
    Query(query): Query<UsernameQuery>,
    UserToken(token): UserToken,
) -> ApiResult<Json<Vec<Value>>> {
    let refreshed = state
        .metadata
        .refresh_dataset(dataset_id, &query.username, &token)
        .await?;
    Ok(Json(refreshed))
}

/// POST /v1/metadata/upload?space&metadata_id&dataset_id&uploader
pub async fn upload_metadata(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    UserToken(token): UserToken,
    Json(content): Json<Value>,
) -> ApiResult<Json<KgInstance>> {
    let request = UploadRequest {
        space: query.space,
        reference_id: query.metadata_id,
        dataset_id: query.dataset_id,
        uploader: query.uploader,
        filename: None,
        content,
    };
    Ok(Json(state.metadata.upload(request, &token).await?))
}

/// PUT /v1/metadata/update/:metadata_id?space&filename&dataset_id&uploader
pub async fn update_metadata(
    State(state): State<AppState>,
    Path(metadata_id): Path<Uuid>,
    Query(query): Query<UpdateQuery>,
    UserToken(token): UserToken,
    Json(content): Json<Value>,
) -> ApiResult<Json<KgInstance>> {
    let request = UploadRequest {
        space: query.space,
        reference_id: metadata_id,
        dataset_id: query.dataset_id,
        uploader: query.uploader,
        filename: Some(query.filename),
        content,
    };
    Ok(Json(state.metadata.update(request, &token).await?))
}

/// PUT /v1/metadata/update/dataset/:dataset_id?username
pub async fn update_dataset_metadata(
    State(state): State<AppState>,
    Path(dataset_id): Path<Uuid>,
    Query(query): Query<UsernameQuery>,
    UserToken(token): UserToken,
) -> ApiResult<Json<Vec<Value>>> {
    let updated = state
        .metadata
        .update_dataset(dataset_id, &query.username, &token)
        .await?;
    Ok(Json(updated))
}

/// DELETE /v1/metadata/:kg_instance_id?username
pub async fn delete_metadata(
    State(state): State<AppState>,
    Path(kg_instance_id): Path<Uuid>,
    Query(query): Query<UsernameQuery>,
    UserToken(token): UserToken,
) -> ApiResult<StatusCode> {
    state
        .metadata
        .delete(kg_instance_id, &query.username, &token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
