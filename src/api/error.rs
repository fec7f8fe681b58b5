use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde_json::json;
use tracing::error;

use crate::error::MonitoringError;

/// Failure half of the response envelope.
#[derive(Debug)]
pub enum ApiError {
    /// 404 with the given message
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing text. Internal details stay in the logs.
    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(m) | ApiError::BadRequest(m) => m,
            ApiError::Internal(_) => "Temporarily unable to process monitoring request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(detail) = &self {
            error!("Monitoring API error: {}", detail);
        }
        let body = Json(json!({
            "success": false,
            "error": self.message(),
            "timestamp": Utc::now(),
        }));
        (status, body).into_response()
    }
}

impl From<MonitoringError> for ApiError {
    fn from(err: MonitoringError) -> Self {
        match err {
            MonitoringError::AlertNotFound { .. } => ApiError::NotFound(err.to_string()),
            MonitoringError::InvalidQuery { .. } => ApiError::BadRequest(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
