//! Shared test doubles for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use book_catalog::activity::{ActivityError, ActivityResult, ActivityStore, InMemoryActivityStore};
use book_catalog::models::{ActivityEvent, NewBook};
use book_catalog::search::{DocumentIndex, InMemoryIndex, IndexResponse, SearchParams, SearchResult};
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory index with injectable latency and panics on writes
#[derive(Default)]
pub struct ScriptedIndex {
    pub inner: InMemoryIndex,
    delay: Duration,
    search_delay: Duration,
    panic_on: Option<String>,
    writes: AtomicUsize,
}

impl ScriptedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Latency added to every search call
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = delay;
        self
    }

    pub fn panicking_on(mut self, id: &str) -> Self {
        self.panic_on = Some(id.to_string());
        self
    }

    /// Write calls that reached the backend
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn before_write(&self, id: &str) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panic_on.as_deref() == Some(id) {
            panic!("scripted failure writing {}", id);
        }
    }
}

#[async_trait]
impl DocumentIndex for ScriptedIndex {
    async fn ping(&self) -> SearchResult<()> {
        self.inner.ping().await
    }

    async fn index_exists(&self, index: &str) -> SearchResult<bool> {
        self.inner.index_exists(index).await
    }

    async fn create_index(&self, index: &str, body: &Value) -> SearchResult<()> {
        self.inner.create_index(index, body).await
    }

    async fn create_document(
        &self,
        index: &str,
        id: &str,
        document: &Value,
    ) -> SearchResult<IndexResponse> {
        self.before_write(id).await;
        self.inner.create_document(index, id, document).await
    }

    async fn update_document(
        &self,
        index: &str,
        id: &str,
        patch: &Value,
    ) -> SearchResult<IndexResponse> {
        self.before_write(id).await;
        self.inner.update_document(index, id, patch).await
    }

    async fn delete_document(&self, index: &str, id: &str) -> SearchResult<IndexResponse> {
        self.before_write(id).await;
        self.inner.delete_document(index, id).await
    }

    async fn search(&self, index: &str, body: &Value, params: &SearchParams) -> SearchResult<Value> {
        if !self.search_delay.is_zero() {
            tokio::time::sleep(self.search_delay).await;
        }
        self.inner.search(index, body, params).await
    }
}

/// Activity store that refuses batches for one user
pub struct FailingActivityStore {
    pub inner: InMemoryActivityStore,
    failing_user: String,
}

impl FailingActivityStore {
    pub fn failing_for(user: &str) -> Self {
        Self {
            inner: InMemoryActivityStore::new(),
            failing_user: user.to_string(),
        }
    }
}

#[async_trait]
impl ActivityStore for FailingActivityStore {
    async fn push_events(
        &self,
        user: &str,
        events: &[ActivityEvent],
        retention: usize,
    ) -> ActivityResult<()> {
        if user == self.failing_user {
            return Err(ActivityError::StoreUnavailable("connection reset".to_string()));
        }
        self.inner.push_events(user, events, retention).await
    }

    async fn recent(&self, user: &str) -> ActivityResult<Vec<ActivityEvent>> {
        self.inner.recent(user).await
    }
}

pub fn sample_book(title: &str, author: &str, price: f64) -> NewBook {
    NewBook {
        title: title.to_string(),
        author_name: author.to_string(),
        price,
        ebook_available: false,
        publish_date: NaiveDate::from_ymd_opt(2001, 5, 17).unwrap(),
        username: None,
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
