//! Error to HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::GatewayError;

pub type ApiResult<T> = Result<T, GatewayError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.is_unhandled() {
            error!(error = ?self, "Unhandled error while serving request");
        } else if status.is_server_error() {
            warn!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code(),
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}
