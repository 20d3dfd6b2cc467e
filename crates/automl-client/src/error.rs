//! Vertex AI client error types.

use thiserror::Error;

/// Result type for Vertex AI operations.
pub type VertexResult<T> = Result<T, VertexError>;

/// Errors that can occur while talking to Vertex AI.
#[derive(Debug, Error)]
pub enum VertexError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Operation {name} failed (code {code}): {message}")]
    OperationFailed {
        name: String,
        code: i32,
        message: String,
    },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Training pipeline {name} ended in state {state}: {message}")]
    TrainingFailed {
        name: String,
        state: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Delay assumed when a 429 response carries no Retry-After header.
const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 1000;

impl VertexError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP status and response body to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        Self::from_http_status_with_retry_after(status, message, None)
    }

    /// Like [`from_http_status`](Self::from_http_status), keeping the
    /// server-provided Retry-After (in ms) for 429 responses.
    pub fn from_http_status_with_retry_after(
        status: u16,
        message: impl Into<String>,
        retry_after_ms: Option<u64>,
    ) -> Self {
        let message = message.into();
        match status {
            400 => Self::InvalidArgument(message),
            401 => Self::AuthError(message),
            403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            429 => Self::RateLimited(retry_after_ms.unwrap_or(DEFAULT_RATE_LIMIT_DELAY_MS)),
            500..=599 => Self::ServerError(status, message),
            _ => Self::RequestFailed(message),
        }
    }

    /// HTTP status this error corresponds to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            VertexError::InvalidArgument(_) => Some(400),
            VertexError::AuthError(_) => Some(401),
            VertexError::PermissionDenied(_) => Some(403),
            VertexError::NotFound(_) => Some(404),
            VertexError::AlreadyExists(_) => Some(409),
            VertexError::RateLimited(_) => Some(429),
            VertexError::ServerError(status, _) => Some(*status),
            VertexError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Server-requested delay before retrying.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            VertexError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VertexError::Network(_) | VertexError::RateLimited(_) | VertexError::ServerError(_, _)
        )
    }
}
