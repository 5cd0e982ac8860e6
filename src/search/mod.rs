//! Book search over an Elasticsearch-compatible document index
//!
//! This module covers the read path and the backend plumbing shared with the
//! write pipeline:
//!
//! - **Query building**: [`QueryBuilder`] composes term, match and range clauses
//!   plus named aggregations into an immutable [`QueryDocument`]
//! - **Gateway**: [`SearchGateway`] runs a query and parses hits and aggregations
//! - **Backends**: [`ElasticsearchClient`] speaks the REST API with transport
//!   retries; [`InMemoryIndex`] implements the same [`DocumentIndex`] trait in
//!   process
//!
//! # Example
//!
//! ```no_run
//! use book_catalog::search::{
//!     ElasticsearchClient, QueryBuilder, SearchConfig, SearchGateway, SearchOptions,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SearchConfig::default();
//!     let index = config.books_index.clone();
//!     let gateway = SearchGateway::new(Arc::new(ElasticsearchClient::new(config)?), index);
//!
//!     let query = QueryBuilder::new()
//!         .author_name("Herbert")
//!         .price_range(5.0, 20.0)
//!         .build();
//!
//!     let outcome = gateway.search(&query, 20, 0, SearchOptions::new()).await?;
//!     println!("Found {} books", outcome.hits.len());
//!
//!     Ok(())
//! }
//! ```

pub mod aggregations;
pub mod client;
mod config;
mod error;
pub mod gateway;
pub mod mapping;
pub mod memory;
pub mod query;

pub use aggregations::{parse_aggregations, AggregationKind, AggregationSpec};
pub use client::{DocumentIndex, ElasticsearchClient, IndexResponse, SearchParams};
pub use config::{SearchConfig, SearchConfigBuilder};
pub use error::{SearchError, SearchResult};
pub use gateway::{SearchGateway, SearchHit, SearchOptions, SearchOutcome};
pub use mapping::{books_mapping, index_mappings, IndexMapping};
pub use memory::InMemoryIndex;
pub use query::{BookCriteria, Clause, PriceBounds, QueryBuilder, QueryDocument};
