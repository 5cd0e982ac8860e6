//! Durable per-user activity lists

use crate::activity::error::ActivityResult;
use crate::models::ActivityEvent;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;

/// Storage for bounded, newest-first per-user event lists
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Prepend `events` in order and keep only the newest `retention` entries
    async fn push_events(
        &self,
        user: &str,
        events: &[ActivityEvent],
        retention: usize,
    ) -> ActivityResult<()>;

    /// Stored events for `user`, newest first
    async fn recent(&self, user: &str) -> ActivityResult<Vec<ActivityEvent>>;

    /// Check that the store answers
    async fn ping(&self) -> ActivityResult<()> {
        Ok(())
    }
}

/// In-process store with the same list semantics as the Redis one
#[derive(Default)]
pub struct InMemoryActivityStore {
    lists: DashMap<String, VecDeque<ActivityEvent>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with at least one stored event
    pub fn user_count(&self) -> usize {
        self.lists.len()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn push_events(
        &self,
        user: &str,
        events: &[ActivityEvent],
        retention: usize,
    ) -> ActivityResult<()> {
        let mut list = self.lists.entry(user.to_string()).or_default();
        for event in events {
            list.push_front(event.clone());
        }
        list.truncate(retention.max(1));
        Ok(())
    }

    async fn recent(&self, user: &str) -> ActivityResult<Vec<ActivityEvent>> {
        Ok(self
            .lists
            .get(user)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }
}
