pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::*;

use crate::catalog::BookCatalog;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<BookCatalog>,
    pub started_at: Instant,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(catalog: Arc<BookCatalog>) -> Self {
        Self {
            catalog,
            started_at: Instant::now(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
