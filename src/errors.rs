use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("booking already finalized (status: {})", .0.as_str())]
    InvalidState(BookingStatus),

    #[error("invalid confirmation code")]
    InvalidCode,

    #[error("code delivery failed: {0}")]
    Delivery(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::InvalidCode => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Delivery(_) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = serde_json::json!({ "error": self.to_string() });
        if let AppError::InvalidState(current) = &self {
            body["status"] = serde_json::Value::from(current.as_str());
        }
        (status, axum::Json(body)).into_response()
    }
}
