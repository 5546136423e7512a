use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::live::LiveError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Live(#[from] LiveError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Store(StoreError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, format!("{what} not found"))
            }
            AppError::Store(StoreError::Conflict(msg)) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable".to_string())
            }
            AppError::Live(e) => match e {
                LiveError::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
                LiveError::NotStarted | LiveError::GameCompleted => {
                    (StatusCode::CONFLICT, e.to_string())
                }
                LiveError::SeatConflict => (StatusCode::FORBIDDEN, e.to_string()),
                LiveError::Malformed(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                LiveError::Storage(_) | LiveError::Retired => {
                    tracing::error!("Live session error: {e}");
                    (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
                }
            },
        };

        // FastAPI-compatible error body: {"detail": "message"}
        (status, Json(json!({ "detail": message }))).into_response()
    }
}
