//! Search backend configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for the Elasticsearch-compatible search backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL of the cluster (e.g. `http://localhost:9200`)
    pub url: String,

    /// Basic auth user
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<String>,

    /// Index that holds the book documents
    pub books_index: String,

    /// Whole-request timeout in seconds
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Idle connections are dropped after this many seconds
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle connections kept per host
    pub pool_max_idle_per_host: usize,

    /// TCP keepalive interval in seconds
    pub tcp_keepalive_secs: u64,

    /// Transport-level retries for retryable statuses and connection errors
    pub max_retries: u32,

    /// Statuses that are retried by the transport
    pub retry_on_status: Vec<u16>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            books_index: "books".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 30,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 10,
            tcp_keepalive_secs: 30,
            max_retries: 3,
            retry_on_status: vec![502, 503, 504],
        }
    }
}

impl SearchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }

    pub fn tcp_keepalive(&self) -> Duration {
        Duration::from_secs(self.tcp_keepalive_secs)
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    pub fn books_index(mut self, index: impl Into<String>) -> Self {
        self.config.books_index = index.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_on_status(mut self, statuses: Vec<u16>) -> Self {
        self.config.retry_on_status = statuses;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_statuses() {
        let config = SearchConfig::default();
        assert!(config.is_retryable(503));
        assert!(!config.is_retryable(404));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_builder_overrides() {
        let config = SearchConfigBuilder::new()
            .url("http://es:9200")
            .books_index("books_test")
            .max_retries(0)
            .build();

        assert_eq!(config.url, "http://es:9200");
        assert_eq!(config.books_index, "books_test");
        assert_eq!(config.max_retries, 0);
    }
}
