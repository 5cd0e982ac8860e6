//! Write pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What `submit` does before the pool has been started
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    /// Reject with `NotStarted`
    #[default]
    FailFast,

    /// Hold the caller until `start` runs
    WaitForStart,
}

/// Sizing of the write worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Workers spawned by the composition root
    pub worker_count: usize,

    /// Bounded queue capacity; submitters wait when it is full
    pub queue_capacity: usize,

    pub submit_policy: SubmitPolicy,

    /// Deadline applied to tasks enqueued without one
    pub task_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            queue_capacity: 1000,
            submit_policy: SubmitPolicy::FailFast,
            task_timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}
