use spin_sdk::http::Response;
use std::fmt;

/// Failures raised by the relationship store and feed assembler.
///
/// No-op outcomes (already following, self-follow and the like) are not
/// errors; they are reported as success variants on the operation's own
/// outcome enum so callers can give idempotent feedback.
#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    InvalidArgument(String),
    Backend(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(msg) => write!(f, "not found: {}", msg),
            StoreError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            StoreError::Backend(err) => write!(f, "storage error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Backend(err)
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Conflict(String),
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            StoreError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            StoreError::Backend(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        let (status, msg) = match err {
            ApiError::BadRequest(msg) => (400, msg),
            ApiError::Unauthorized => (401, "Unauthorized".to_string()),
            ApiError::NotFound(msg) => (404, msg),
            ApiError::Conflict(msg) => (409, msg),
            ApiError::InternalError(msg) => (500, msg),
        };
        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({"error": msg})).unwrap_or_default())
            .build()
    }
}
