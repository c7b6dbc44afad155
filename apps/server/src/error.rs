//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;
use tujali_shared::HealthError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.to_string(),
        }
    }

    pub fn forbidden(message: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<HealthError> for ApiError {
    fn from(err: HealthError) -> Self {
        let status = match &err {
            HealthError::NotFound(_) => StatusCode::NOT_FOUND,
            HealthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HealthError::ValidationError(_) => StatusCode::BAD_REQUEST,
            HealthError::Conflict(_) => StatusCode::CONFLICT,
            HealthError::StorageError(_) | HealthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if err.is_storage() {
            // Details stay in the log
            error!(error = %err, "request failed");
            return Self::internal("Internal server error");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}
