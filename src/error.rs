//! API-level errors and their HTTP rendering

use crate::search::SearchError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the HTTP API
#[derive(Error, Debug)]
pub enum AppError {
    /// Request body could not be read as a search or indexing request
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The search cluster is unreachable; retryable
    #[error("Search cluster unavailable: {0}")]
    IndexUnavailable(String),

    /// A search could not be executed or its results not read
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    #[error("Indexing failed: {0}")]
    Indexing(String),

    #[error("Misconfigured: {0}")]
    Configuration(String),

    #[error("Could not encode or decode JSON: {0}")]
    Serialization(String),

    /// A defect in this service rather than in the request or cluster
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and stable machine-readable code
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::IndexUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "INDEX_UNAVAILABLE")
            }
            AppError::QueryFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "QUERY_FAILED"),
            AppError::Provisioning(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PROVISIONING_ERROR")
            }
            AppError::Indexing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INDEXING_ERROR"),
            AppError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            AppError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    pub fn error_code(&self) -> &'static str {
        self.parts().1
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code, status = status.as_u16(), %message, "Request failed");
        } else {
            tracing::warn!(code, status = status.as_u16(), %message, "Request rejected");
        }

        let body = json!({
            "error": { "code": code, "message": message, "status": status.as_u16() }
        });
        (status, Json(body)).into_response()
    }
}

/// Single mapping point from search failures to API failures
impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::IndexUnavailable(msg) => AppError::IndexUnavailable(msg),
            SearchError::IndexNotFound(msg) => AppError::NotFound(format!("index {}", msg)),
            SearchError::InvalidDocument(msg) => AppError::Validation(msg),
            SearchError::InvalidConfiguration(msg) => AppError::Configuration(msg),
            err @ SearchError::Provisioning { .. } => AppError::Provisioning(err.to_string()),
            SearchError::Indexing(msg) => AppError::Indexing(msg),
            SearchError::Serialization(e) => AppError::Serialization(e.to_string()),
            err @ (SearchError::QueryFailed(_)
            | SearchError::MalformedHit { .. }
            | SearchError::Http { .. }
            | SearchError::Schema(_)) => AppError::QueryFailed(err.to_string()),
            err @ SearchError::QueryConstruction(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
