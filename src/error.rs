use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::{analysis::AnalysisError, sessions::SessionError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    MissingSession(String),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("{0}")]
    SessionNotFound(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingSession(_) | AppError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Upload-side mapping: an unknown or closed session is reported like a missing one.
impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Internal(err) => AppError::Internal(err),
            other => AppError::MissingSession(other.to_string()),
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::SessionNotFound(id) => {
                AppError::SessionNotFound(format!("No captures found for session {id}"))
            }
            AnalysisError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(err) => {
                error!("Request failed: {err:#}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_bad_request() {
        let err: AppError = SessionError::Missing.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Session ID is missing.");

        let err: AppError = SessionError::NotActive("session_1".into()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_captures_map_to_not_found() {
        let err: AppError = AnalysisError::SessionNotFound("session_1".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: AppError = AnalysisError::Internal(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
