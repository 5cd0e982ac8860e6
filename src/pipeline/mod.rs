//! Asynchronous write pipeline
//!
//! Mutations are queued on a bounded channel and applied to the document index
//! by a fixed set of workers. Each task carries its own result channel, so the
//! submitter can await the outcome of exactly the write it queued.

mod config;
mod error;
mod pool;
mod task;

pub use config::{PipelineConfig, SubmitPolicy};
pub use error::{PipelineError, PipelineResult};
pub use pool::{PoolStats, WritePool};
pub use task::{MutationResult, MutationTask, Operation, PendingMutation};
