//! HTTP error mapping for the dashboard service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::pipeline::{EditError, PipelineError};
use crate::session::SessionError;

/// Dashboard service errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing or malformed bearer token")]
    Unauthorized,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("No pipeline run yet; POST /api/v1/runs first")]
    NoRun,

    #[error(transparent)]
    Common(#[from] capex_common::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Status code and stable error code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized | Self::Session(SessionError::NotFound) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            Self::Session(SessionError::Expired) => (StatusCode::UNAUTHORIZED, "SESSION_EXPIRED"),
            Self::Session(SessionError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS")
            }
            Self::Session(SessionError::NotConfigured) => {
                (StatusCode::SERVICE_UNAVAILABLE, "LOGIN_NOT_CONFIGURED")
            }
            Self::Pipeline(e @ PipelineError::Encoding(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.code())
            }
            Self::Pipeline(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.code()),
            Self::Edit(EditError::UnknownGroup { .. }) => (StatusCode::NOT_FOUND, "GROUP_NOT_FOUND"),
            Self::Edit(EditError::NotFinite(_)) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            Self::NoRun => (StatusCode::NOT_FOUND, "NO_RUN"),
            Self::Common(e) if e.status_code() == 400 => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST")
            }
            Self::Common(_) | Self::Task(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "error": ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
