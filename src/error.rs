//! # Gateway Error Taxonomy
//!
//! Every failure the gateway can produce is one variant of [`GatewayError`].
//! Each variant maps to exactly one HTTP status class through
//! [`GatewayError::status_code`], which the web layer uses verbatim.

use thiserror::Error;

/// Postgres SQLSTATE for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Remote system answered with a 4xx/5xx status
    #[error("Remote service error ({status}): {details}")]
    RemoteService { status: u16, details: String },

    /// Remote system answered successfully but without a `data` envelope
    #[error("Remote resource returned no data")]
    NoData,

    /// Remote system timed out or could not be reached
    #[error("Remote resource is not available: {0}")]
    NotAvailable(String),

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("No authorization token in the request")]
    TokenNotProvided,

    #[error("Dataset is not connected to a project")]
    NoProject,

    #[error("Requested resource is not found")]
    NotFound,

    #[error("Space was already created")]
    SpaceAlreadyExists,

    #[error("Metadata already exists")]
    MetadataAlreadyExists,

    #[error("Unhandled error: {0}")]
    Unhandled(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn remote(status: u16, details: impl Into<String>) -> Self {
        Self::RemoteService {
            status,
            details: details.into(),
        }
    }

    pub fn unhandled(message: impl Into<String>) -> Self {
        Self::Unhandled(message.into())
    }

    /// HTTP status for this error. Upstream errors keep the remote status.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::RemoteService { status, .. } => *status,
            GatewayError::NoData | GatewayError::NotAvailable(_) => 503,
            GatewayError::TokenExchangeFailed(_) => 401,
            GatewayError::TokenNotProvided => 422,
            GatewayError::NoProject | GatewayError::NotFound => 404,
            GatewayError::SpaceAlreadyExists | GatewayError::MetadataAlreadyExists => 400,
            GatewayError::Unhandled(_)
            | GatewayError::Database(_)
            | GatewayError::Configuration(_) => 500,
        }
    }

    /// Component-specific error code, prefixed with the error domain
    pub fn code(&self) -> String {
        let code = match self {
            GatewayError::RemoteService { .. } => "remote_service_exception",
            GatewayError::NoData => "no_data",
            GatewayError::NotAvailable(_) => "not_available",
            GatewayError::TokenExchangeFailed(_) => "not_authorised",
            GatewayError::TokenNotProvided => "no_token",
            GatewayError::NoProject => "no_project",
            GatewayError::NotFound => "not_found",
            GatewayError::SpaceAlreadyExists | GatewayError::MetadataAlreadyExists => {
                "already_exists"
            }
            GatewayError::Unhandled(_)
            | GatewayError::Database(_)
            | GatewayError::Configuration(_) => "unhandled_exception",
        };
        format!("global.{code}")
    }

    /// Caller-facing explanation. Transport and internal detail is withheld.
    pub fn details(&self) -> String {
        match self {
            GatewayError::RemoteService { details, .. } => details.clone(),
            GatewayError::NoData => "Remote resource returned no data.".to_string(),
            GatewayError::NotAvailable(_) => "Remote resource is not available.".to_string(),
            GatewayError::TokenExchangeFailed(_) => {
                "Could not exchange authentication token with Keycloak".to_string()
            }
            GatewayError::Unhandled(_)
            | GatewayError::Database(_)
            | GatewayError::Configuration(_) => "Unexpected Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }

    /// True for the 500 class that must be logged with full context
    pub fn is_unhandled(&self) -> bool {
        matches!(
            self,
            GatewayError::Unhandled(_) | GatewayError::Database(_) | GatewayError::Configuration(_)
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            GatewayError::NotAvailable(err.to_string())
        } else if err.is_decode() {
            GatewayError::NoData
        } else {
            GatewayError::Unhandled(err.to_string())
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => GatewayError::NotFound,
            sqlx::Error::PoolTimedOut => GatewayError::NotAvailable("database pool timed out".into()),
            other => GatewayError::Database(other.to_string()),
        }
    }
}

/// True when a sqlx error is a primary/unique key violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}
