use crate::activity::error::{ActivityError, ActivityResult};
use crate::activity::store::ActivityStore;
use crate::models::ActivityEvent;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Redis-backed activity store
#[derive(Clone)]
pub struct RedisActivityStore {
    connection: ConnectionManager,
    key_prefix: String,
}

impl RedisActivityStore {
    /// Connect and verify the connection with a PING
    pub async fn new(redis_url: &str, prefix: &str) -> ActivityResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            ActivityError::StoreUnavailable(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            ActivityError::StoreUnavailable(format!("Failed to connect to Redis: {}", e))
        })?;

        let store = Self {
            connection,
            key_prefix: prefix.to_string(),
        };
        store.ping().await?;

        tracing::info!("Initialized Redis activity store with prefix '{}'", prefix);
        Ok(store)
    }

    /// Get the list key holding a user's actions
    fn actions_key(&self, user: &str) -> String {
        format!("{}:user:{}:actions", self.key_prefix, user)
    }
}

#[async_trait]
impl ActivityStore for RedisActivityStore {
    async fn push_events(
        &self,
        user: &str,
        events: &[ActivityEvent],
        retention: usize,
    ) -> ActivityResult<()> {
        if events.is_empty() {
            return Ok(());
        }

        let payloads = events
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let key = self.actions_key(user);
        let stop = retention.max(1) as isize - 1;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for payload in &payloads {
            pipe.lpush(&key, payload).ignore();
        }
        pipe.ltrim(&key, 0, stop).ignore();

        let mut conn = self.connection.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;

        tracing::debug!(user, events = payloads.len(), "Activity batch written");
        Ok(())
    }

    async fn recent(&self, user: &str) -> ActivityResult<Vec<ActivityEvent>> {
        let mut conn = self.connection.clone();
        let values: Vec<String> = conn.lrange(self.actions_key(user), 0, -1).await?;

        values
            .iter()
            .map(|value| serde_json::from_str(value).map_err(ActivityError::from))
            .collect()
    }

    async fn ping(&self) -> ActivityResult<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| {
                ActivityError::StoreUnavailable(format!("Redis connection test failed: {}", e))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const TEST_REDIS_URL: &str = "redis://127.0.0.1:6379/15";

    // Helper to check if Redis is available
    async fn redis_available() -> bool {
        match Client::open(TEST_REDIS_URL) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(mut conn) => redis::cmd("PING")
                    .query_async::<_, String>(&mut conn)
                    .await
                    .is_ok(),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    async fn create_test_store() -> Option<RedisActivityStore> {
        if !redis_available().await {
            return None;
        }

        let prefix = format!("test-{}", Uuid::new_v4());
        RedisActivityStore::new(TEST_REDIS_URL, &prefix).await.ok()
    }

    #[tokio::test]
    async fn test_push_and_trim() {
        let Some(store) = create_test_store().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };
        assert_eq!(store.actions_key("alice"), format!("{}:user:alice:actions", store.key_prefix));

        let events: Vec<_> = (0..5)
            .map(|i| ActivityEvent::new("GET", format!("/v1/books/{}", i), "alice"))
            .collect();
        store.push_events("alice", &events, 3).await.unwrap();

        let recent = store.recent("alice").await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].path, "/v1/books/4");
        assert_eq!(recent[2].path, "/v1/books/2");
    }

    #[tokio::test]
    async fn test_recent_for_unknown_user() {
        let Some(store) = create_test_store().await else {
            eprintln!("Skipping test: Redis not available");
            return;
        };

        assert!(store.recent("nobody").await.unwrap().is_empty());
    }
}
