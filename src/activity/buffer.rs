//! Batched activity persistence
//!
//! Producers hand events to [`ActivityBuffer::append`], which never blocks: a
//! full channel drops the event. A single accumulator task groups events per
//! user and flushes every group when one reaches `flush_size` or when the
//! flush interval ticks. The group map lock covers only the swap; store I/O
//! happens outside it.

use crate::activity::config::ActivityConfig;
use crate::activity::error::ActivityResult;
use crate::activity::store::ActivityStore;
use crate::metrics::{
    ACTIVITY_EVENTS_DROPPED_TOTAL, ACTIVITY_EVENTS_FLUSHED_TOTAL, ACTIVITY_FLUSH_FAILURES_TOTAL,
};
use crate::models::ActivityEvent;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Outcome of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Users whose batch was attempted
    pub users: usize,

    /// Events persisted
    pub events: usize,

    /// Users whose batch the store failed
    pub failed_users: usize,
}

struct Batches {
    store: Arc<dyn ActivityStore>,
    pending: Mutex<HashMap<String, Vec<ActivityEvent>>>,
    retention: usize,
}

impl Batches {
    /// Buffer an event, returning the size of its user's batch
    fn add(&self, event: ActivityEvent) -> usize {
        let mut pending = self.pending.lock();
        let batch = pending.entry(event.user.clone()).or_default();
        batch.push(event);
        batch.len()
    }

    fn len(&self) -> usize {
        self.pending.lock().values().map(Vec::len).sum()
    }

    async fn flush(&self) -> FlushReport {
        let batches = std::mem::take(&mut *self.pending.lock());
        let mut report = FlushReport::default();

        for (user, events) in batches {
            report.users += 1;
            match self.store.push_events(&user, &events, self.retention).await {
                Ok(()) => {
                    report.events += events.len();
                    ACTIVITY_EVENTS_FLUSHED_TOTAL.inc_by(events.len() as u64);
                }
                Err(e) => {
                    // Failed batches are not re-buffered
                    report.failed_users += 1;
                    ACTIVITY_FLUSH_FAILURES_TOTAL.inc();
                    error!(user = %user, events = events.len(), error = %e, "Failed to persist activity batch");
                }
            }
        }

        if report.users > 0 {
            debug!(
                users = report.users,
                events = report.events,
                failed_users = report.failed_users,
                "Activity flushed"
            );
        }
        report
    }
}

/// Bounded, non-blocking activity log in front of an [`ActivityStore`]
pub struct ActivityBuffer {
    sender: Mutex<Option<mpsc::Sender<ActivityEvent>>>,
    batches: Arc<Batches>,
    accumulator: Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl ActivityBuffer {
    /// Spawn the accumulator and return the producer handle
    pub fn start(store: Arc<dyn ActivityStore>, config: &ActivityConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
        let batches = Arc::new(Batches {
            store,
            pending: Mutex::new(HashMap::new()),
            retention: config.retention.max(1),
        });

        let accumulator = tokio::spawn(accumulate(
            batches.clone(),
            receiver,
            config.flush_size.max(1),
            config.flush_interval(),
        ));

        info!(
            channel_capacity = config.channel_capacity,
            flush_size = config.flush_size,
            flush_interval_secs = config.flush_interval_secs,
            retention = config.retention,
            "Activity buffer started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            batches,
            accumulator: Mutex::new(Some(accumulator)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Hand an event to the accumulator; returns `false` if it was dropped
    pub fn append(&self, event: ActivityEvent) -> bool {
        let rejected = match self.sender.lock().as_ref() {
            Some(sender) => match sender.try_send(event) {
                Ok(()) => return true,
                Err(TrySendError::Full(event)) => ("channel full", event),
                Err(TrySendError::Closed(event)) => ("channel closed", event),
            },
            None => ("buffer shut down", event),
        };

        let (reason, event) = rejected;
        self.dropped.fetch_add(1, Ordering::Relaxed);
        ACTIVITY_EVENTS_DROPPED_TOTAL.inc();
        warn!(user = %event.user, path = %event.path, reason, "Dropping activity event");
        false
    }

    /// Persist everything buffered so far
    pub async fn flush(&self) -> FlushReport {
        self.batches.flush().await
    }

    /// Stored events for `user`, newest first
    pub async fn recent(&self, user: &str) -> ActivityResult<Vec<ActivityEvent>> {
        self.batches.store.recent(user).await
    }

    /// Events accepted by the accumulator but not yet flushed
    pub fn buffered_len(&self) -> usize {
        self.batches.len()
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the channel and wait for the accumulator's final flush
    pub async fn shutdown(&self) {
        // Dropping the only sender closes the channel
        drop(self.sender.lock().take());

        let handle = self.accumulator.lock().take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!(error = %e, "Activity accumulator terminated abnormally");
                }
                info!("Activity buffer shut down");
            }
            None => warn!("Activity buffer is already shut down"),
        }
    }
}

async fn accumulate(
    batches: Arc<Batches>,
    mut receiver: mpsc::Receiver<ActivityEvent>,
    flush_size: usize,
    flush_interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + flush_interval, flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Some(event) => {
                    if batches.add(event) >= flush_size {
                        batches.flush().await;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                batches.flush().await;
            }
        }
    }

    let report = batches.flush().await;
    info!(
        users = report.users,
        events = report.events,
        failed_users = report.failed_users,
        "Activity accumulator stopped after final flush"
    );
}
