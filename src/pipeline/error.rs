//! Error types for the write pipeline

use crate::error::AppError;
use crate::search::SearchError;

/// Result type for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors produced while submitting or executing a mutation
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    /// Submission before `start` under the fail-fast policy
    #[error("Write pool has not been started")]
    NotStarted,

    /// Submission after `shutdown`
    #[error("Write queue is closed")]
    QueueClosed,

    /// Unknown operation code or unusable payload
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Task deadline passed before or during the backend call
    #[error("Task cancelled: {0}")]
    Cancelled(String),

    /// The backend call panicked inside the worker
    #[error("Worker panicked: {0}")]
    WorkerPanic(String),

    /// The search backend failed the write
    #[error(transparent)]
    Backend(#[from] SearchError),

    /// The result sender was dropped without a result
    #[error("Result channel closed before a result was delivered")]
    ResultDropped,
}

impl PipelineError {
    /// HTTP status of a backend rejection, if any
    pub fn backend_status(&self) -> Option<u16> {
        match self {
            PipelineError::Backend(e) => e.status(),
            _ => None,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotStarted | PipelineError::QueueClosed => AppError::QueueClosed,
            PipelineError::InvalidOperation(msg) => AppError::InvalidOperation(msg),
            PipelineError::Cancelled(msg) => AppError::Timeout(msg),
            PipelineError::Backend(e) => e.into(),
            other => AppError::Internal(other.to_string()),
        }
    }
}
