//! Error types for the cataloger server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::search::SearchError;
use crate::submission::SubmissionError;
use crate::suggest::SuggestError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not available: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Catalog error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Suggestion error: {0}")]
    Suggest(#[from] SuggestError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Submission(e) => {
                tracing::error!("Catalog error: {}", e);
                match e {
                    SubmissionError::NotConfigured => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "not_configured",
                        "Catalog endpoint is not configured".to_string(),
                    ),
                    SubmissionError::Timeout => (
                        StatusCode::GATEWAY_TIMEOUT,
                        "catalog_timeout",
                        "Catalog request timed out".to_string(),
                    ),
                    SubmissionError::Http { status, .. } if status.is_client_error() => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "catalog_rejected",
                        format!("Catalog rejected the submission ({})", status.as_u16()),
                    ),
                    _ => (
                        StatusCode::BAD_GATEWAY,
                        "catalog_error",
                        "Catalog request failed".to_string(),
                    ),
                }
            }
            AppError::Search(e) => {
                tracing::error!("Search error: {}", e);
                match e {
                    SearchError::Timeout => (
                        StatusCode::GATEWAY_TIMEOUT,
                        "search_timeout",
                        "Search timed out".to_string(),
                    ),
                    _ => (
                        StatusCode::BAD_GATEWAY,
                        "search_error",
                        "Search request failed".to_string(),
                    ),
                }
            }
            AppError::Suggest(e) => {
                tracing::error!("Suggestion error: {}", e);
                match e {
                    SuggestError::NotConfigured => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "not_configured",
                        "Suggestion service is not configured".to_string(),
                    ),
                    _ => (
                        StatusCode::BAD_GATEWAY,
                        "suggestion_error",
                        "Suggestion request failed".to_string(),
                    ),
                }
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
