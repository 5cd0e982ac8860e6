//! Mutation tasks and their result correlation

use crate::pipeline::error::PipelineError;
use crate::search::IndexResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

/// Kind of write applied to the document index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    /// Raw code outside the known set; answered with `InvalidOperation`
    Unknown(i32),
}

impl Operation {
    pub const CREATE: i32 = 0;
    pub const UPDATE: i32 = 1;
    pub const DELETE: i32 = 2;

    pub fn from_code(code: i32) -> Self {
        match code {
            Self::CREATE => Operation::Create,
            Self::UPDATE => Operation::Update,
            Self::DELETE => Operation::Delete,
            other => Operation::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Operation::Create => Self::CREATE,
            Operation::Update => Self::UPDATE,
            Operation::Delete => Self::DELETE,
            Operation::Unknown(code) => *code,
        }
    }

    /// Metric/log label
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Unknown(code) => write!(f, "unknown({})", code),
            known => f.write_str(known.as_str()),
        }
    }
}

/// Outcome of one task, delivered exactly once
#[derive(Debug, Clone)]
pub struct MutationResult {
    pub task_id: Uuid,
    pub operation: Operation,
    pub document_id: String,
    pub result: Result<IndexResponse, PipelineError>,
}

impl MutationResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// A unit of write work, consumed by exactly one worker
#[derive(Debug)]
pub struct MutationTask {
    pub id: Uuid,
    pub operation: Operation,
    pub index: String,
    pub document_id: String,
    pub payload: Value,
    pub deadline: Option<Instant>,
    pub(crate) reply: oneshot::Sender<MutationResult>,
}

impl MutationTask {
    /// Build a task and the handle that receives its result
    pub fn new(
        operation: Operation,
        index: impl Into<String>,
        document_id: impl Into<String>,
        payload: Value,
    ) -> (Self, PendingMutation) {
        let (reply, receiver) = oneshot::channel();
        let id = Uuid::new_v4();
        let document_id = document_id.into();

        let pending = PendingMutation {
            task_id: id,
            operation,
            document_id: document_id.clone(),
            receiver,
        };

        let task = Self {
            id,
            operation,
            index: index.into(),
            document_id,
            payload,
            deadline: None,
            reply,
        };

        (task, pending)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| d <= Instant::now())
    }
}

/// Caller side of a submitted task
#[derive(Debug)]
pub struct PendingMutation {
    task_id: Uuid,
    operation: Operation,
    document_id: String,
    receiver: oneshot::Receiver<MutationResult>,
}

impl PendingMutation {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Wait for the worker's result
    pub async fn wait(self) -> MutationResult {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => MutationResult {
                task_id: self.task_id,
                operation: self.operation,
                document_id: self.document_id,
                result: Err(PipelineError::ResultDropped),
            },
        }
    }
}
