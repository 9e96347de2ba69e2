//! Unified handler error type.
//!
//! Handlers return `Result<_, ApiError>`; the `IntoResponse` impl maps each
//! kind to its status and a JSON `{"detail": ...}` body. A malformed
//! evaluator reply is not an error at this level — the scoring handler
//! recovers it locally with a fallback breakdown.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::llm::CompletionError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The referenced lesson does not exist.
    #[error("Lesson not found")]
    LessonNotFound,

    /// A store call failed. `detail` carries the fixed caller-facing message
    /// the lesson endpoints use; without one the error text itself is sent.
    #[error("store error: {source}")]
    Store {
        detail: Option<&'static str>,
        source: sqlx::Error,
    },

    /// The completion provider call failed.
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),
}

impl ApiError {
    pub fn store(detail: &'static str, source: sqlx::Error) -> Self {
        ApiError::Store {
            detail: Some(detail),
            source,
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(source: sqlx::Error) -> Self {
        ApiError::Store {
            detail: None,
            source,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::LessonNotFound => (StatusCode::NOT_FOUND, "Lesson not found".to_owned()),
            ApiError::Store { detail, source } => {
                error!(error = %source, "store call failed");
                let msg = match detail {
                    Some(d) => d.to_owned(),
                    None => format!("Server Error: {source}"),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ApiError::Completion(e) => {
                error!(error = %e, "completion call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Server Error: {e}"),
                )
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
