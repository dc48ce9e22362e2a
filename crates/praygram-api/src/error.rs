use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

/// API error taxonomy. Every handler failure is translated into one of these
/// before crossing the HTTP boundary; backend detail (rusqlite messages, join
/// errors) is logged server-side and never echoed to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("Group not found")]
    GroupNotFound,

    #[error("Prayer not found")]
    PrayerNotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Failed to join group")]
    JoinFailed(#[source] anyhow::Error),

    #[error("Failed to create group")]
    GroupCreationFailed(#[source] anyhow::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::GroupNotFound | ApiError::PrayerNotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::JoinFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GroupCreationFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::GroupNotFound => "GROUP_NOT_FOUND",
            ApiError::PrayerNotFound => "PRAYER_NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::JoinFailed(_) => "JOIN_FAILED",
            ApiError::GroupCreationFailed(_) => "GROUP_CREATION_FAILED",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::JoinFailed(source) | ApiError::GroupCreationFailed(source) => {
                error!("{}: {:#}", self.code(), source);
            }
            ApiError::Internal(source) => {
                error!("INTERNAL: {:#}", source);
            }
            _ => {}
        }

        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });

        (self.status(), Json(body)).into_response()
    }
}
