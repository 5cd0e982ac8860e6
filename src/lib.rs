//! Book catalog service
//!
//! Writes go through an asynchronous, bounded worker pool in front of an
//! Elasticsearch-compatible index; reads are composed with a fluent query
//! builder and served synchronously; per-user request activity is buffered and
//! persisted to Redis in batches.

pub mod activity;
pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod search;

pub use error::{AppError, Result};
