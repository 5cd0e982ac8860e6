//! Bounded write worker pool

use crate::metrics::{
    MUTATIONS_COMPLETED_TOTAL, MUTATIONS_SUBMITTED_TOTAL, MUTATION_DURATION_SECONDS,
    WRITE_QUEUE_DEPTH,
};
use crate::pipeline::config::{PipelineConfig, SubmitPolicy};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::task::{MutationResult, MutationTask, Operation, PendingMutation};
use crate::search::{DocumentIndex, IndexResponse};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

enum Lifecycle {
    Idle,
    Running {
        sender: mpsc::Sender<MutationTask>,
        workers: Vec<JoinHandle<()>>,
    },
    ShutDown,
}

/// Pool snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub queue_capacity: usize,
    pub queued: usize,
    pub started: bool,
    pub shut_down: bool,
}

/// Applies mutations to the document index through a bounded queue.
///
/// Every submitted task is consumed by exactly one worker and answered with
/// exactly one [`MutationResult`]. `shutdown` closes the queue and waits for
/// the workers to drain it, so nothing accepted is lost.
pub struct WritePool {
    index: Arc<dyn DocumentIndex>,
    config: PipelineConfig,
    state: Mutex<Lifecycle>,
    /// Flips to `true` once the pool leaves `Idle`
    left_idle: watch::Sender<bool>,
}

impl WritePool {
    pub fn new(index: Arc<dyn DocumentIndex>, config: PipelineConfig) -> Self {
        let (left_idle, _) = watch::channel(false);
        Self {
            index,
            config,
            state: Mutex::new(Lifecycle::Idle),
            left_idle,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Create the queue and spawn `worker_count` workers
    pub fn start(&self, worker_count: usize) {
        let mut state = self.state.lock();
        match *state {
            Lifecycle::Running { .. } => {
                warn!("Write pool is already running");
                return;
            }
            Lifecycle::ShutDown => {
                warn!("Write pool has been shut down and cannot be restarted");
                return;
            }
            Lifecycle::Idle => {}
        }

        let worker_count = if worker_count == 0 {
            warn!("Write pool started with zero workers, using one");
            1
        } else {
            worker_count
        };
        let capacity = self.config.queue_capacity.max(1);

        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(AsyncMutex::new(receiver));

        let workers = (0..worker_count)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    index: self.index.clone(),
                    receiver: receiver.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        *state = Lifecycle::Running { sender, workers };
        drop(state);
        self.left_idle.send_replace(true);

        info!(
            workers = worker_count,
            queue_capacity = capacity,
            "Write pool started"
        );
    }

    /// Queue a task, waiting for space when the queue is full
    pub async fn submit(&self, task: MutationTask) -> PipelineResult<()> {
        let sender = loop {
            let current = match &*self.state.lock() {
                Lifecycle::Running { sender, .. } => Some(Ok(sender.clone())),
                Lifecycle::ShutDown => Some(Err(PipelineError::QueueClosed)),
                Lifecycle::Idle => None,
            };

            match current {
                Some(sender) => break sender?,
                None if self.config.submit_policy == SubmitPolicy::FailFast => {
                    return Err(PipelineError::NotStarted)
                }
                None => {
                    debug!(task_id = %task.id, "Write pool not started, waiting");
                    let mut left_idle = self.left_idle.subscribe();
                    if left_idle.wait_for(|left| *left).await.is_err() {
                        return Err(PipelineError::QueueClosed);
                    }
                }
            }
        };

        let task_id = task.id;
        let operation = task.operation;

        let permit = sender
            .reserve()
            .await
            .map_err(|_| PipelineError::QueueClosed)?;
        // Counted before the task becomes visible so a worker's dec() never precedes it
        WRITE_QUEUE_DEPTH.inc();
        permit.send(task);

        MUTATIONS_SUBMITTED_TOTAL
            .with_label_values(&[operation.as_str()])
            .inc();
        debug!(task_id = %task_id, operation = %operation, "Task queued");

        Ok(())
    }

    /// Build a task, submit it and hand back its result handle.
    ///
    /// Without an explicit deadline the configured task timeout applies.
    pub async fn enqueue(
        &self,
        operation: Operation,
        index: impl Into<String>,
        document_id: impl Into<String>,
        payload: Value,
        deadline: Option<Instant>,
    ) -> PipelineResult<PendingMutation> {
        let (mut task, pending) = MutationTask::new(operation, index, document_id, payload);
        task.deadline = deadline.or_else(|| {
            self.config
                .task_timeout()
                .map(|timeout| Instant::now() + timeout)
        });

        self.submit(task).await?;
        Ok(pending)
    }

    /// Stop accepting tasks and wait for the queue to drain
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), Lifecycle::ShutDown);
        // Wake submitters parked on WaitForStart
        self.left_idle.send_replace(true);

        match previous {
            Lifecycle::Idle => info!("Write pool shut down before it was started"),
            Lifecycle::ShutDown => warn!("Write pool is already shut down"),
            Lifecycle::Running { sender, workers } => {
                drop(sender);
                info!(workers = workers.len(), "Draining write queue");

                for handle in workers {
                    if let Err(e) = handle.await {
                        error!(error = %e, "Write worker terminated abnormally");
                    }
                }

                info!("Write pool shut down");
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let (workers, queued, started, shut_down) = match &*state {
            Lifecycle::Idle => (0, 0, false, false),
            Lifecycle::Running { sender, workers } => (
                workers.len(),
                sender.max_capacity() - sender.capacity(),
                true,
                false,
            ),
            Lifecycle::ShutDown => (0, 0, true, true),
        };

        PoolStats {
            workers,
            queue_capacity: self.config.queue_capacity,
            queued,
            started,
            shut_down,
        }
    }
}

struct Worker {
    id: usize,
    index: Arc<dyn DocumentIndex>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<MutationTask>>>,
}

impl Worker {
    async fn run(self) {
        info!(worker_id = self.id, "Write worker started");

        loop {
            let next = self.receiver.lock().await.recv().await;
            let Some(task) = next else {
                break;
            };

            WRITE_QUEUE_DEPTH.dec();
            self.process(task).await;
        }

        info!(worker_id = self.id, "Write worker stopped");
    }

    async fn process(&self, task: MutationTask) {
        let MutationTask {
            id,
            operation,
            index,
            document_id,
            payload,
            deadline,
            reply,
        } = task;

        let timer = MUTATION_DURATION_SECONDS
            .with_label_values(&[operation.as_str()])
            .start_timer();
        let result = self
            .execute(operation, &index, &document_id, &payload, deadline)
            .await;
        timer.observe_duration();

        let outcome = match &result {
            Ok(response) => {
                debug!(
                    worker_id = self.id,
                    task_id = %id,
                    index = %index,
                    document_id = %document_id,
                    result = %response.result,
                    "Mutation applied"
                );
                "ok"
            }
            Err(e) => {
                warn!(
                    worker_id = self.id,
                    task_id = %id,
                    operation = %operation,
                    document_id = %document_id,
                    error = %e,
                    "Mutation failed"
                );
                "error"
            }
        };
        MUTATIONS_COMPLETED_TOTAL
            .with_label_values(&[operation.as_str(), outcome])
            .inc();

        let delivered = reply.send(MutationResult {
            task_id: id,
            operation,
            document_id,
            result,
        });
        if delivered.is_err() {
            debug!(worker_id = self.id, task_id = %id, "Result receiver dropped");
        }
    }

    async fn execute(
        &self,
        operation: Operation,
        index: &str,
        document_id: &str,
        payload: &Value,
        deadline: Option<Instant>,
    ) -> PipelineResult<IndexResponse> {
        if deadline.map_or(false, |d| d <= Instant::now()) {
            return Err(PipelineError::Cancelled(
                "deadline passed before dispatch".to_string(),
            ));
        }

        let call = AssertUnwindSafe(dispatch(
            self.index.as_ref(),
            operation,
            index,
            document_id,
            payload,
        ))
        .catch_unwind();

        let outcome = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, call)
                .await
                .map_err(|_| {
                    PipelineError::Cancelled("deadline passed during backend call".to_string())
                })?,
            None => call.await,
        };

        outcome.unwrap_or_else(|panic| Err(PipelineError::WorkerPanic(panic_message(&*panic))))
    }
}

async fn dispatch(
    index: &dyn DocumentIndex,
    operation: Operation,
    index_name: &str,
    document_id: &str,
    payload: &Value,
) -> PipelineResult<IndexResponse> {
    match operation {
        Operation::Create => {
            require_object(operation, payload)?;
            Ok(index
                .create_document(index_name, document_id, payload)
                .await?)
        }
        Operation::Update => {
            require_object(operation, payload)?;
            Ok(index
                .update_document(index_name, document_id, payload)
                .await?)
        }
        Operation::Delete => Ok(index.delete_document(index_name, document_id).await?),
        Operation::Unknown(code) => Err(PipelineError::InvalidOperation(format!(
            "unknown operation code {}",
            code
        ))),
    }
}

fn require_object(operation: Operation, payload: &Value) -> PipelineResult<()> {
    if payload.is_object() {
        Ok(())
    } else {
        Err(PipelineError::InvalidOperation(format!(
            "{} payload must be a JSON object",
            operation
        )))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
