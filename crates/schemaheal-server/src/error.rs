//! API errors and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use schemaheal_engine::{MonitorError, ValidationError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

/// Body of every error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, String) {
        let ApiError::Monitor(error) = self;
        match error {
            MonitorError::IssueNotFound(_) => (StatusCode::NOT_FOUND, "ISSUE_NOT_FOUND".into()),
            MonitorError::IssueClosed { .. } => (StatusCode::CONFLICT, "ISSUE_CLOSED".into()),
            MonitorError::Paused(_) => (StatusCode::CONFLICT, "MONITOR_PAUSED".into()),
            MonitorError::Validation(ValidationError::ApprovalRequired) => {
                (StatusCode::CONFLICT, "APPROVAL_REQUIRED".into())
            }
            MonitorError::Validation(validation) => {
                (StatusCode::UNPROCESSABLE_ENTITY, validation.code().to_uppercase())
            }
            MonitorError::Synthesis(_) => (StatusCode::UNPROCESSABLE_ENTITY, "SYNTHESIS_FAILED".into()),
            MonitorError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR".into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
