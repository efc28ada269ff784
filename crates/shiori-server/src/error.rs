//! Mapping of workflow errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shiori::WorkflowError;

/// Error returned by the API handlers.
#[derive(Debug)]
pub struct ApiError {
    error: WorkflowError,
    session_id: Option<String>,
}

impl ApiError {
    /// Attaches the session the request was about.
    pub fn for_session(error: WorkflowError, session_id: impl Into<String>) -> Self {
        Self {
            error,
            session_id: Some(session_id.into()),
        }
    }

    fn status(&self) -> StatusCode {
        match &self.error {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::NotFound(_) | WorkflowError::UnknownSession(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        Self {
            error,
            session_id: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.error {
            WorkflowError::Validation(message) => message.clone(),
            WorkflowError::NotFound(_) => "Result not found".to_string(),
            WorkflowError::UnknownSession(_) => "Session not found".to_string(),
            error if status.is_server_error() => {
                tracing::error!(error = %error, "Request failed");
                error.to_string()
            }
            error => error.to_string(),
        };

        let body = match self.session_id {
            Some(session_id) => json!({ "error": message, "session_id": session_id }),
            None => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiori::{CheckpointKey, SessionId, StorageError};

    fn status_of(error: WorkflowError) -> StatusCode {
        ApiError::from(error).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        let id = SessionId::parse("session_1_deadbeef").expect("valid id");
        assert_eq!(
            status_of(WorkflowError::Validation("segment required".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(WorkflowError::NotFound(CheckpointKey::completed(id.clone()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(WorkflowError::UnknownSession(id)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(WorkflowError::Storage(StorageError::io(
                "analyses_data",
                std::io::Error::other("disk full"),
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
