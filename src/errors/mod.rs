use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("storage error")]
    Storage(#[from] redis::RedisError),
    #[error("malformed stored record")]
    Serialization(#[from] serde_json::Error),
    #[error("event not found")]
    NotFound,
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Storage(err) => {
                tracing::error!(error = ?err, "storage operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage error occurred".to_owned(),
                )
            }
            AppError::Serialization(err) => {
                tracing::error!(error = ?err, "stored record failed to deserialize");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage error occurred".to_owned(),
                )
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, "Event not found".to_owned()),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.to_owned()),
            AppError::Internal(message) => {
                tracing::error!(message, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_owned())
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
