use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Everything a room or realtime operation can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rejected input; nothing was persisted.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// The backing store errored or is unreachable. Never retried.
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Persistence(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show a client. Server-side failures stay generic.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => self.to_string(),
            AppError::Persistence(_) => "storage unavailable".to_owned(),
            AppError::Internal(_) => "internal server error".to_owned(),
        }
    }

    pub fn log(&self) {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, error_code = self.error_code(), "server error");
        } else {
            tracing::debug!(error = %self, error_code = self.error_code(), "request rejected");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        (
            status,
            Json(json!({
                "error": self.user_message(),
                "errorCode": self.error_code(),
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}
