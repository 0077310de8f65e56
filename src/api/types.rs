// src/api/types.rs

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::infra::errors::TrackError;

/// Request body for selecting a task to time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
    pub task_id: String,
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

impl From<TrackError> for ErrorResponse {
    fn from(err: TrackError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

/// Map a tracking error onto an HTTP status.
pub fn track_error(err: TrackError) -> ApiError {
    let status = match &err {
        TrackError::TaskNotFound { .. }
        | TrackError::ProjectNotFound { .. }
        | TrackError::UnknownCalendarToken { .. } => StatusCode::NOT_FOUND,
        TrackError::RemoteTimeout { .. } | TrackError::Store(_) => StatusCode::BAD_GATEWAY,
        TrackError::ServiceStopped => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("API request failed: {}", err);
    }
    (status, Json(err.into()))
}
