use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::decision_service::error::SessionError;

/// Request-level failure, mapped onto an HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("missing required query parameter: {field}")]
    Validation { field: &'static str },
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ServeError {
    pub fn missing_field(field: &'static str) -> Self {
        ServeError::Validation { field }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::Validation { .. } => StatusCode::BAD_REQUEST,
            ServeError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
