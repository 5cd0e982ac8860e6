//! Book catalog operations
//!
//! [`BookCatalog`] ties the write pool, the search gateway and the activity
//! buffer together. Writes return as soon as the mutation is queued; the
//! returned [`BookAccepted`] carries the handle for awaiting the outcome.

use crate::activity::ActivityBuffer;
use crate::error::{AppError, Result};
use crate::models::{ActivityEvent, Book, BookSearch, NewBook, TitleUpdate};
use crate::pipeline::{Operation, PendingMutation, PoolStats, WritePool};
use crate::search::aggregations::BOOK_STATS;
use crate::search::{parse_aggregations, QueryBuilder, SearchGateway, SearchOptions};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Page size used when a search asks for zero hits
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A write accepted onto the queue
#[derive(Debug)]
pub struct BookAccepted {
    pub id: String,
    pub pending: PendingMutation,
}

/// Parse a book id, rejecting anything that is not a UUID
pub fn parse_book_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::Validation(format!("invalid book id '{}'", id)))
}

#[derive(Clone)]
pub struct BookCatalog {
    books_index: String,
    pool: Arc<WritePool>,
    gateway: SearchGateway,
    activity: Arc<ActivityBuffer>,
}

impl BookCatalog {
    pub fn new(pool: Arc<WritePool>, gateway: SearchGateway, activity: Arc<ActivityBuffer>) -> Self {
        Self {
            books_index: gateway.default_index().to_string(),
            pool,
            gateway,
            activity,
        }
    }

    pub fn pool(&self) -> &Arc<WritePool> {
        &self.pool
    }

    pub fn gateway(&self) -> &SearchGateway {
        &self.gateway
    }

    pub fn activity(&self) -> &Arc<ActivityBuffer> {
        &self.activity
    }

    /// Queue a new book under a fresh id
    pub async fn create_book(&self, new_book: NewBook) -> Result<BookAccepted> {
        new_book.validate()?;

        let id = Uuid::new_v4().to_string();
        let document = new_book.into_book(id.clone()).to_document()?;
        let pending = self
            .pool
            .enqueue(Operation::Create, &self.books_index, &id, document, None)
            .await?;

        info!(book_id = %id, "Book queued for creation");
        Ok(BookAccepted { id, pending })
    }

    pub async fn update_title(&self, id: &str, update: TitleUpdate) -> Result<BookAccepted> {
        parse_book_id(id)?;
        update.validate()?;

        let patch = serde_json::to_value(&update)?;
        let pending = self
            .pool
            .enqueue(Operation::Update, &self.books_index, id, patch, None)
            .await?;

        info!(book_id = %id, "Book queued for update");
        Ok(BookAccepted {
            id: id.to_string(),
            pending,
        })
    }

    pub async fn delete_book(&self, id: &str) -> Result<BookAccepted> {
        parse_book_id(id)?;

        let pending = self
            .pool
            .enqueue(Operation::Delete, &self.books_index, id, Value::Null, None)
            .await?;

        info!(book_id = %id, "Book queued for deletion");
        Ok(BookAccepted {
            id: id.to_string(),
            pending,
        })
    }

    pub async fn get_book(&self, id: &str) -> Result<Option<Book>> {
        parse_book_id(id)?;

        let query = QueryBuilder::new().id(id).build();
        let outcome = self
            .gateway
            .search(&query, 1, 0, SearchOptions::new())
            .await?;

        outcome.hits.first().map(Book::from_hit).transpose()
    }

    pub async fn search_books(&self, search: &BookSearch) -> Result<Vec<Book>> {
        search.validate_request()?;

        let size = if search.size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            search.size
        };
        let query = search.to_query().build();
        let outcome = self
            .gateway
            .search(&query, size, search.from, SearchOptions::new())
            .await?;

        info!(hits = outcome.hits.len(), "Book search executed");
        outcome.hits.iter().map(Book::from_hit).collect()
    }

    /// Catalog-wide statistics from the `book_stats` aggregation group
    pub async fn book_stats(&self) -> Result<BTreeMap<String, i64>> {
        let query = QueryBuilder::new().distinct_authors().total_books().build();
        let outcome = self
            .gateway
            .search(
                &query,
                0,
                0,
                SearchOptions::new().with_track_total_hits(true),
            )
            .await?;

        Ok(parse_aggregations(&outcome.aggregations, BOOK_STATS)?)
    }

    /// Buffer an activity event; `false` when it was dropped
    pub fn record_activity(&self, event: ActivityEvent) -> bool {
        self.activity.append(event)
    }

    pub async fn recent_activity(&self, user: &str) -> Result<Vec<ActivityEvent>> {
        Ok(self.activity.recent(user).await?)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Drain the write pool, then flush the activity buffer
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        self.activity.shutdown().await;
    }
}
