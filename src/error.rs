use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedMediaType(String),

    #[error("File too large: {size} bytes (limit {max})")]
    FileTooLarge { size: usize, max: usize },

    #[error("User not found")]
    NotFound,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl AppError {
    /// Status code, stable error label, and optional client-safe detail.
    /// Server-side causes are logged here and never echoed to the client.
    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database error", None)
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage error", None)
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation failed",
                Some(msg.clone()),
            ),
            AppError::UnsupportedMediaType(mime) => (
                StatusCode::BAD_REQUEST,
                "unsupported file type",
                Some(format!("file type {} is not allowed", mime)),
            ),
            AppError::FileTooLarge { size, max } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "file too large",
                Some(format!("file is {} bytes, limit is {}", size, max)),
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, "user not found", None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.parts();
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

/// Same errors rendered as plain text for the browser form route.
#[derive(Debug)]
pub struct FormError(pub AppError);

impl From<AppError> for FormError {
    fn from(err: AppError) -> Self {
        FormError(err)
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.0.parts();
        let body = match message {
            Some(detail) => format!("{}: {}", error, detail),
            None => error.to_string(),
        };
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
