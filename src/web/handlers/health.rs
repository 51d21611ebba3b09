//! # Service Liveness Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
}

/// Service banner: GET /
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("Service KG Integration On, Version: {}", state.version),
    })
}

/// Record store connectivity: GET /v1/health
///
/// 204 when the store answers, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    match state.stores.spaces.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(error = %e, "Record store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json("Database is unavailable.")).into_response()
        }
    }
}
