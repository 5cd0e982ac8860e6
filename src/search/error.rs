//! Error types for search operations

use crate::error::AppError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while talking to the search backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    /// Connection or transport failure
    #[error("Search backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Non-2xx answer from the backend
    #[error("Search backend rejected request with status {status}: {body}")]
    BackendRejected { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Malformed search response: {0}")]
    MalformedResponse(String),

    /// Deadline expired before the backend answered
    #[error("Search request cancelled: {0}")]
    Cancelled(String),

    /// Request body could not be encoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SearchError {
    /// HTTP status carried by a rejection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SearchError::BackendRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SearchError::MalformedResponse(err.to_string())
        } else {
            SearchError::BackendUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Serialization(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::BackendUnavailable(msg) => AppError::BackendUnavailable(msg),
            SearchError::BackendRejected { status, body } => AppError::BackendRejected {
                status,
                message: body,
            },
            SearchError::MalformedResponse(msg) => AppError::MalformedResponse(msg),
            SearchError::Cancelled(msg) => AppError::Timeout(msg),
            SearchError::Serialization(msg) => AppError::Serialization(msg),
            SearchError::InvalidConfiguration(msg) => AppError::Configuration(msg),
        }
    }
}
