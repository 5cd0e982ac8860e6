//! Buffered per-user activity log persisted to Redis

mod buffer;
mod config;
mod error;
mod redis_store;
mod store;

pub use buffer::{ActivityBuffer, FlushReport};
pub use config::ActivityConfig;
pub use error::{ActivityError, ActivityResult};
pub use redis_store::RedisActivityStore;
pub use store::{ActivityStore, InMemoryActivityStore};
