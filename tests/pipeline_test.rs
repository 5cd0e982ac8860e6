//! Integration tests for the write worker pool

mod common;

use book_catalog::metrics::WRITE_QUEUE_DEPTH;
use book_catalog::pipeline::{
    MutationTask, Operation, PipelineConfig, PipelineError, SubmitPolicy, WritePool,
};
use book_catalog::search::{
    DocumentIndex, InMemoryIndex, QueryBuilder, SearchError, SearchGateway, SearchOptions,
};
use common::{wait_until, ScriptedIndex};
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn config() -> PipelineConfig {
    PipelineConfig {
        queue_capacity: 16,
        submit_policy: SubmitPolicy::FailFast,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_every_task_gets_exactly_one_result() {
    let index = Arc::new(InMemoryIndex::new());
    let pool = WritePool::new(index.clone(), config());
    pool.start(4);

    let mut pending = Vec::new();
    for i in 0..50 {
        let id = format!("book-{}", i);
        pending.push(
            pool.enqueue(Operation::Create, "books", id, json!({"title": "t"}), None)
                .await
                .unwrap(),
        );
    }

    let mut task_ids = HashSet::new();
    for handle in pending {
        let result = handle.wait().await;
        assert!(result.is_ok(), "unexpected failure: {:?}", result.result);
        assert!(task_ids.insert(result.task_id));
    }

    assert_eq!(task_ids.len(), 50);
    assert_eq!(index.len("books"), 50);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_queued_tasks() {
    let index = Arc::new(ScriptedIndex::new().with_delay(Duration::from_millis(5)));
    let pool = WritePool::new(index.clone(), config());
    pool.start(2);

    let mut pending = Vec::new();
    for i in 0..12 {
        pending.push(
            pool.enqueue(Operation::Create, "books", format!("b{}", i), json!({}), None)
                .await
                .unwrap(),
        );
    }

    pool.shutdown().await;
    assert!(pool.stats().shut_down);

    for handle in pending {
        assert!(handle.wait().await.is_ok());
    }
    assert_eq!(index.writes(), 12);
    assert_eq!(index.inner.len("books"), 12);
}

#[tokio::test]
async fn test_created_document_is_searchable() {
    let index = Arc::new(InMemoryIndex::new());
    let pool = WritePool::new(index.clone(), config());
    let gateway = SearchGateway::new(index.clone(), "books");
    pool.start(1);

    let created = pool
        .enqueue(
            Operation::Create,
            "books",
            "b1",
            json!({"title": "The Rust Book", "author_name": "Klabnik", "price": 39.5}),
            None,
        )
        .await
        .unwrap()
        .wait()
        .await;
    assert_eq!(created.result.unwrap().result, "created");

    let query = QueryBuilder::new().id("b1").build();
    let outcome = gateway
        .search(&query, 1, 0, SearchOptions::new())
        .await
        .unwrap();

    assert_eq!(outcome.hits.len(), 1);
    assert_eq!(outcome.hits[0].id, "b1");
    assert_eq!(outcome.hits[0].source["title"], "The Rust Book");
    pool.shutdown().await;
}

#[tokio::test]
async fn test_update_merges_patch() {
    let index = Arc::new(InMemoryIndex::new());
    let pool = WritePool::new(index.clone(), config());
    pool.start(1);

    pool.enqueue(Operation::Create, "books", "b1", json!({"title": "Old", "price": 5.0}), None)
        .await
        .unwrap()
        .wait()
        .await;
    let updated = pool
        .enqueue(Operation::Update, "books", "b1", json!({"title": "New"}), None)
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(updated.operation, Operation::Update);
    assert_eq!(updated.result.unwrap().result, "updated");
    let stored = index.document("books", "b1").unwrap();
    assert_eq!(stored["title"], "New");
    assert_eq!(stored["price"], 5.0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_delete_of_missing_document_is_rejected() {
    let pool = WritePool::new(Arc::new(InMemoryIndex::new()), config());
    pool.start(1);

    let result = pool
        .enqueue(Operation::Delete, "books", "missing", json!(null), None)
        .await
        .unwrap()
        .wait()
        .await;

    match result.result {
        Err(PipelineError::Backend(SearchError::BackendRejected { status, .. })) => {
            assert_eq!(status, 404)
        }
        other => panic!("expected a 404 rejection, got {:?}", other),
    }
    pool.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_create_conflicts() {
    let pool = WritePool::new(Arc::new(InMemoryIndex::new()), config());
    pool.start(1);

    let first = pool
        .enqueue(Operation::Create, "books", "b1", json!({"title": "a"}), None)
        .await
        .unwrap()
        .wait()
        .await;
    assert!(first.is_ok());

    let second = pool
        .enqueue(Operation::Create, "books", "b1", json!({"title": "b"}), None)
        .await
        .unwrap()
        .wait()
        .await;
    assert_eq!(second.result.unwrap_err().backend_status(), Some(409));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_unknown_operation_code_is_answered() {
    let index = Arc::new(ScriptedIndex::new());
    let pool = WritePool::new(index.clone(), config());
    pool.start(1);

    let (task, pending) =
        MutationTask::new(Operation::from_code(9), "books", "b1", json!({"title": "x"}));
    pool.submit(task).await.unwrap();

    let result = pending.wait().await;
    assert!(matches!(result.result, Err(PipelineError::InvalidOperation(_))));
    assert_eq!(index.writes(), 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_expired_deadline_is_cancelled_without_backend_call() {
    let index = Arc::new(ScriptedIndex::new());
    let pool = WritePool::new(index.clone(), config());
    pool.start(1);

    let result = pool
        .enqueue(
            Operation::Create,
            "books",
            "b1",
            json!({}),
            Some(Instant::now() - Duration::from_millis(1)),
        )
        .await
        .unwrap()
        .wait()
        .await;

    assert!(matches!(result.result, Err(PipelineError::Cancelled(_))));
    assert_eq!(index.writes(), 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_deadline_during_backend_call_is_cancelled() {
    let index = Arc::new(ScriptedIndex::new().with_delay(Duration::from_millis(500)));
    let pool = WritePool::new(index.clone(), config());
    pool.start(1);

    let result = pool
        .enqueue(
            Operation::Create,
            "books",
            "b1",
            json!({}),
            Some(Instant::now() + Duration::from_millis(20)),
        )
        .await
        .unwrap()
        .wait()
        .await;

    assert!(matches!(result.result, Err(PipelineError::Cancelled(_))));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_configured_task_timeout_applies() {
    let index = Arc::new(ScriptedIndex::new().with_delay(Duration::from_millis(1500)));
    let pool = WritePool::new(
        index,
        PipelineConfig {
            task_timeout_secs: Some(1),
            ..config()
        },
    );
    pool.start(1);

    let result = pool
        .enqueue(Operation::Create, "books", "b1", json!({}), None)
        .await
        .unwrap()
        .wait()
        .await;

    assert!(matches!(result.result, Err(PipelineError::Cancelled(_))));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_panicking_backend_is_reported_and_worker_survives() {
    let index = Arc::new(ScriptedIndex::new().panicking_on("bad"));
    let pool = WritePool::new(index.clone(), config());
    pool.start(1);

    let panicked = pool
        .enqueue(Operation::Create, "books", "bad", json!({}), None)
        .await
        .unwrap()
        .wait()
        .await;
    match panicked.result {
        Err(PipelineError::WorkerPanic(message)) => assert!(message.contains("bad")),
        other => panic!("expected a worker panic, got {:?}", other),
    }

    let next = pool
        .enqueue(Operation::Create, "books", "good", json!({}), None)
        .await
        .unwrap()
        .wait()
        .await;
    assert!(next.is_ok());
    pool.shutdown().await;
}

#[tokio::test]
async fn test_backpressure_with_tiny_queue() {
    let index = Arc::new(ScriptedIndex::new().with_delay(Duration::from_millis(2)));
    let pool = WritePool::new(
        index.clone(),
        PipelineConfig {
            queue_capacity: 1,
            ..config()
        },
    );
    pool.start(1);

    let mut pending = Vec::new();
    for i in 0..8 {
        pending.push(
            pool.enqueue(Operation::Create, "books", format!("b{}", i), json!({}), None)
                .await
                .unwrap(),
        );
    }
    for handle in pending {
        assert!(handle.wait().await.is_ok());
    }
    assert_eq!(pool.stats().queue_capacity, 1);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_submit_waits_while_queue_is_full() {
    let index = Arc::new(ScriptedIndex::new().with_delay(Duration::from_millis(500)));
    let pool = WritePool::new(
        index.clone(),
        PipelineConfig {
            queue_capacity: 1,
            ..config()
        },
    );
    pool.start(1);

    // The only worker picks this up and stalls in the backend
    let in_flight = pool
        .enqueue(Operation::Create, "books", "b0", json!({}), None)
        .await
        .unwrap();
    assert!(wait_until(|| index.writes() == 1, Duration::from_secs(2)).await);

    // Fills the single slot
    let queued = pool
        .enqueue(Operation::Create, "books", "b1", json!({}), None)
        .await
        .unwrap();
    assert_eq!(pool.stats().queued, 1);

    let blocked = tokio::time::timeout(
        Duration::from_millis(100),
        pool.enqueue(Operation::Create, "books", "b2", json!({}), None),
    )
    .await;
    assert!(blocked.is_err(), "submit returned while the queue was full");

    assert!(in_flight.wait().await.is_ok());
    assert!(queued.wait().await.is_ok());
    pool.shutdown().await;

    // The abandoned submission never reached the queue
    assert_eq!(index.inner.len("books"), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_queue_depth_gauge_never_negative() {
    let pool = Arc::new(WritePool::new(
        Arc::new(InMemoryIndex::new()),
        PipelineConfig {
            queue_capacity: 4,
            ..config()
        },
    ));
    pool.start(4);

    let sampling = Arc::new(AtomicBool::new(true));
    let sampler = {
        let sampling = sampling.clone();
        tokio::spawn(async move {
            let mut lowest = i64::MAX;
            while sampling.load(Ordering::SeqCst) {
                lowest = lowest.min(WRITE_QUEUE_DEPTH.get());
                tokio::task::yield_now().await;
            }
            lowest.min(WRITE_QUEUE_DEPTH.get())
        })
    };

    let mut submitters = Vec::new();
    for s in 0..4 {
        let pool = pool.clone();
        submitters.push(tokio::spawn(async move {
            for i in 0..50 {
                let handle = pool
                    .enqueue(Operation::Create, "books", format!("s{}-{}", s, i), json!({}), None)
                    .await
                    .unwrap();
                assert!(handle.wait().await.is_ok());
            }
        }));
    }
    for submitter in submitters {
        submitter.await.unwrap();
    }

    sampling.store(false, Ordering::SeqCst);
    assert!(sampler.await.unwrap() >= 0);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_dropped_result_handle_does_not_stall_workers() {
    let index = Arc::new(InMemoryIndex::new());
    let pool = WritePool::new(index.clone(), config());
    pool.start(1);

    drop(
        pool.enqueue(Operation::Create, "books", "b1", json!({}), None)
            .await
            .unwrap(),
    );
    let second = pool
        .enqueue(Operation::Create, "books", "b2", json!({}), None)
        .await
        .unwrap()
        .wait()
        .await;

    assert!(second.is_ok());
    assert!(index.ping().await.is_ok());
    assert_eq!(index.len("books"), 2);
    pool.shutdown().await;
}
