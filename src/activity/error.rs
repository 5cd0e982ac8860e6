//! Error types for the activity log

use crate::error::AppError;
use redis::RedisError;

/// Result type for activity operations
pub type ActivityResult<T> = std::result::Result<T, ActivityError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ActivityError {
    /// The store could not be reached
    #[error("Activity store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store refused the command
    #[error("Activity store rejected command: {0}")]
    StoreRejected(String),

    /// An event could not be encoded or decoded
    #[error("Activity serialization failed: {0}")]
    Serialization(String),
}

impl From<RedisError> for ActivityError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            ActivityError::StoreUnavailable(err.to_string())
        } else {
            ActivityError::StoreRejected(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ActivityError {
    fn from(err: serde_json::Error) -> Self {
        ActivityError::Serialization(err.to_string())
    }
}

impl From<ActivityError> for AppError {
    fn from(err: ActivityError) -> Self {
        match err {
            ActivityError::StoreUnavailable(msg) => AppError::BackendUnavailable(msg),
            ActivityError::StoreRejected(msg) => AppError::Internal(msg),
            ActivityError::Serialization(msg) => AppError::Serialization(msg),
        }
    }
}
