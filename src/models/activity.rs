use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEvent {
    pub method: String,
    pub path: String,
    pub time: DateTime<Utc>,
    pub user: String,
}

impl ActivityEvent {
    /// Event stamped with the current time
    pub fn new(method: impl Into<String>, path: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            time: Utc::now(),
            user: user.into(),
        }
    }
}
