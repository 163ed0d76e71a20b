use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionErrorKind {
    /// Transport failure, timeout or non-success status from the service.
    Service,
    /// The service answered, but not in the expected shape.
    Protocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOperation {
    Decide,
    Observe,
}

impl SessionOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOperation::Decide => "decide",
            SessionOperation::Observe => "observe",
        }
    }
}

impl fmt::Display for SessionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub operation: SessionOperation,
    pub message: String,
    pub http_status: Option<u16>,
}

impl SessionError {
    pub fn new(
        kind: SessionErrorKind,
        operation: SessionOperation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.http_status {
            Some(status) => write!(
                f,
                "{} failed: {} (status={})",
                self.operation, self.message, status
            ),
            None => write!(f, "{} failed: {}", self.operation, self.message),
        }
    }
}

impl std::error::Error for SessionError {}

pub fn service_error(operation: SessionOperation, message: impl Into<String>) -> SessionError {
    SessionError::new(SessionErrorKind::Service, operation, message)
}

pub fn protocol_error(operation: SessionOperation, message: impl Into<String>) -> SessionError {
    SessionError::new(SessionErrorKind::Protocol, operation, message)
}

/// Maps a non-success HTTP status from the service. The body is truncated so a
/// misbehaving agent cannot flood the logs.
pub fn map_http_error(operation: SessionOperation, status: u16, body: &str) -> SessionError {
    let normalized_body = body.chars().take(240).collect::<String>();
    let message = if normalized_body.trim().is_empty() {
        "decision service returned non-success status".to_string()
    } else {
        format!(
            "decision service returned non-success status: {}",
            normalized_body.trim()
        )
    };
    service_error(operation, message).with_http_status(status)
}
