use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum MeridianError {
    #[error("Upstream source unavailable: {source_name}")]
    SourceUnavailable { source_name: &'static str },

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("A refresh is already running")]
    RefreshInProgress,

    #[error("Refresh timed out")]
    RefreshTimedOut,

    #[error("Summary render failed: {0}")]
    RenderFailed(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),
}

/// Closed classification of [`MeridianError`], one per boundary condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SourceUnavailable,
    Persistence,
    NotFound,
    Validation,
    RefreshInProgress,
    RefreshTimeout,
    RenderFailed,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::SourceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::RefreshInProgress => StatusCode::CONFLICT,
            ErrorKind::RefreshTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Persistence | ErrorKind::RenderFailed | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::SourceUnavailable => "SOURCE_UNAVAILABLE",
            ErrorKind::Persistence => "PERSISTENCE_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::RefreshInProgress => "REFRESH_IN_PROGRESS",
            ErrorKind::RefreshTimeout => "REFRESH_TIMEOUT",
            ErrorKind::RenderFailed => "RENDER_FAILED",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl MeridianError {
    pub fn validation(message: impl Into<String>) -> Self {
        MeridianError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MeridianError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            MeridianError::Persistence(_) => ErrorKind::Persistence,
            MeridianError::NotFound(_) => ErrorKind::NotFound,
            MeridianError::Validation { .. } => ErrorKind::Validation,
            MeridianError::RefreshInProgress => ErrorKind::RefreshInProgress,
            MeridianError::RefreshTimedOut => ErrorKind::RefreshTimeout,
            MeridianError::RenderFailed(_) => ErrorKind::RenderFailed,
            MeridianError::RactorError(_) | MeridianError::UnexpectedError(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Boundary payload for this error. Internal faults never carry their diagnostic text.
    pub fn to_body(&self) -> ApiErrorBody {
        let kind = self.kind();
        let (message, details) = match self {
            MeridianError::SourceUnavailable { source_name } => (
                "External data source unavailable".to_string(),
                Some(Value::String(format!(
                    "Could not fetch data from {source_name}"
                ))),
            ),
            MeridianError::NotFound(what) => (what.clone(), None),
            MeridianError::Validation { message, details } => (message.clone(), details.clone()),
            MeridianError::RefreshInProgress => {
                ("A refresh is already in progress.".to_string(), None)
            }
            MeridianError::RefreshTimedOut => (
                "Request timed out while refreshing cache.".to_string(),
                None,
            ),
            MeridianError::RenderFailed(_) => {
                ("Failed to generate summary image.".to_string(), None)
            }
            MeridianError::Persistence(_)
            | MeridianError::RactorError(_)
            | MeridianError::UnexpectedError(_) => {
                ("An internal server error occurred.".to_string(), None)
            }
        };

        ApiErrorBody {
            inner: ApiErrorObject {
                code: kind.code().to_string(),
                message,
                details,
            },
        }
    }
}

impl IntoResponse for MeridianError {
    fn into_response(self) -> axum::response::Response {
        let kind = self.kind();
        if kind.status().is_server_error() {
            error!(kind = kind.code(), error = %self, "request failed");
        }
        (kind.status(), Json(self.to_body())).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Debug, Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}
