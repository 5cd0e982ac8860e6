//! Activity log configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Buffering and persistence settings for the activity log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Redis connection URL
    pub redis_url: String,

    /// Prefix of every per-user list key
    pub key_prefix: String,

    /// Events held between producers and the accumulator
    pub channel_capacity: usize,

    /// Per-user buffered event count that triggers a flush
    pub flush_size: usize,

    /// Periodic flush interval in seconds
    pub flush_interval_secs: u64,

    /// Events kept per user in the store
    pub retention: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "book-catalog".to_string(),
            channel_capacity: 1000,
            flush_size: 100,
            flush_interval_secs: 5,
            retention: 3,
        }
    }
}

impl ActivityConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }
}
