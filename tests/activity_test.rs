//! Activity buffer behavior against in-memory stores

mod common;

use book_catalog::activity::{
    ActivityBuffer, ActivityConfig, ActivityStore, FlushReport, InMemoryActivityStore,
};
use book_catalog::models::ActivityEvent;
use common::{wait_until, FailingActivityStore};
use std::sync::Arc;
use std::time::Duration;

fn config(channel_capacity: usize, flush_size: usize, flush_interval_secs: u64) -> ActivityConfig {
    ActivityConfig {
        channel_capacity,
        flush_size,
        flush_interval_secs,
        retention: 3,
        ..Default::default()
    }
}

fn event(user: &str, n: usize) -> ActivityEvent {
    ActivityEvent::new("GET", format!("/v1/books/{}", n), user)
}

#[tokio::test]
async fn test_flush_size_triggers_flush_and_keeps_newest() {
    let store = Arc::new(InMemoryActivityStore::new());
    let buffer = ActivityBuffer::start(store.clone(), &config(64, 5, 3600));

    for n in 0..5 {
        assert!(buffer.append(event("alice", n)));
    }

    assert!(wait_until(|| store.user_count() == 1, Duration::from_secs(2)).await);

    let stored = store.recent("alice").await.unwrap();
    let paths: Vec<&str> = stored.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["/v1/books/4", "/v1/books/3", "/v1/books/2"]);
    assert_eq!(buffer.buffered_len(), 0);
    buffer.shutdown().await;
}

#[tokio::test]
async fn test_threshold_flushes_every_user() {
    let store = Arc::new(InMemoryActivityStore::new());
    let buffer = ActivityBuffer::start(store.clone(), &config(64, 3, 3600));

    assert!(buffer.append(event("bob", 0)));
    for n in 0..3 {
        assert!(buffer.append(event("alice", n)));
    }

    assert!(wait_until(|| store.user_count() == 2, Duration::from_secs(2)).await);
    assert_eq!(store.recent("bob").await.unwrap().len(), 1);
    buffer.shutdown().await;
}

#[tokio::test]
async fn test_periodic_flush() {
    let store = Arc::new(InMemoryActivityStore::new());
    let buffer = ActivityBuffer::start(store.clone(), &config(64, 100, 1));

    assert!(buffer.append(event("carol", 1)));
    assert!(wait_until(|| store.user_count() == 1, Duration::from_secs(3)).await);
    buffer.shutdown().await;
}

#[tokio::test]
async fn test_full_channel_drops_events() {
    let store = Arc::new(InMemoryActivityStore::new());
    let buffer = ActivityBuffer::start(store.clone(), &config(1, 100, 3600));

    // The accumulator cannot run between these calls on the test runtime
    let accepted: Vec<bool> = (0..3).map(|n| buffer.append(event("dave", n))).collect();

    assert_eq!(accepted, [true, false, false]);
    assert_eq!(buffer.dropped_events(), 2);

    buffer.shutdown().await;
    assert_eq!(store.recent("dave").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_user_does_not_block_others() {
    let store = Arc::new(FailingActivityStore::failing_for("mallory"));
    let buffer = ActivityBuffer::start(store.clone(), &config(64, 100, 3600));

    assert!(buffer.append(event("mallory", 1)));
    assert!(buffer.append(event("erin", 1)));
    assert!(wait_until(|| buffer.buffered_len() == 2, Duration::from_secs(2)).await);

    let report = buffer.flush().await;
    assert_eq!(
        report,
        FlushReport {
            users: 2,
            events: 1,
            failed_users: 1,
        }
    );
    assert_eq!(store.recent("erin").await.unwrap().len(), 1);
    assert!(store.recent("mallory").await.unwrap().is_empty());

    // Failed batches are gone, not retried
    assert_eq!(buffer.buffered_len(), 0);
    assert_eq!(buffer.flush().await, FlushReport::default());
    buffer.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_performs_final_flush() {
    let store = Arc::new(InMemoryActivityStore::new());
    let buffer = ActivityBuffer::start(store.clone(), &config(64, 100, 3600));

    for n in 0..4 {
        assert!(buffer.append(event("frank", n)));
    }
    buffer.shutdown().await;

    let stored = store.recent("frank").await.unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].path, "/v1/books/3");
    assert!(!buffer.append(event("frank", 9)));
}

#[tokio::test]
async fn test_recent_for_unknown_user_is_empty() {
    let store = Arc::new(InMemoryActivityStore::new());
    let buffer = ActivityBuffer::start(store, &ActivityConfig::default());

    assert!(buffer.recent("nobody").await.unwrap().is_empty());
    buffer.shutdown().await;
}
