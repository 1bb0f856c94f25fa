use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chess_puzzler::ProgressError;
use serde_json::json;

use crate::clients::stockfish::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Sqlx(e) => {
                tracing::error!("Database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Progress(e) => {
                tracing::error!("Progress storage error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Progress storage error".to_string())
            }
            AppError::Engine(e) => {
                tracing::error!("Engine error: {e}");
                (StatusCode::BAD_GATEWAY, "Engine error".to_string())
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
