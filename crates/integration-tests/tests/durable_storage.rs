//! Durable Storage Tests
//!
//! Cache mirror and offline queue against a real SQLite file, across restarts.

mod common;

use common::{open_store, TempDb};
use nexus_core::application::{CacheConfig, OfflineQueue, QueueConfig, ResponseCache};
use nexus_core::domain::{QueuedPayload, QueuedRequest, RequestKind, RequestState, TaskType};
use nexus_core::port::time_provider::SystemTimeProvider;
use nexus_core::port::{KeyValueStore, TimeProvider, TimestampIdProvider};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn load_queue(store: Arc<dyn KeyValueStore>) -> OfflineQueue {
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    OfflineQueue::load(
        store,
        Arc::new(TimestampIdProvider::new(time_provider.clone())),
        time_provider,
        QueueConfig::default(),
    )
    .await
    .unwrap()
}

fn cache_over(store: Arc<dyn KeyValueStore>) -> ResponseCache {
    ResponseCache::with_store(store, Arc::new(SystemTimeProvider), CacheConfig::default())
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let db = TempDb::new("queue-restart");

    let ids = {
        let queue = load_queue(open_store(&db).await).await;
        let first = queue
            .enqueue(
                RequestKind::AiTask,
                QueuedPayload::new("pressure drop at valve 3", TaskType::Diagnostic),
                None,
            )
            .await
            .unwrap();
        let second = queue
            .enqueue(
                RequestKind::AiTask,
                QueuedPayload::new("nearest depot", TaskType::Map),
                Some(5),
            )
            .await
            .unwrap();
        vec![first, second]
    };

    // Restart: fresh pool, fresh queue
    let queue = load_queue(open_store(&db).await).await;
    let requests = queue.list().await;

    assert_eq!(requests.iter().map(|r| r.id.clone()).collect::<Vec<_>>(), ids);
    assert!(requests.iter().all(|r| r.state == RequestState::Pending));
    assert_eq!(requests[0].payload.task_type, TaskType::Diagnostic);
    assert_eq!(requests[1].max_attempts, 5);
    assert_eq!(queue.pending_count().await, 2);
}

#[tokio::test]
async fn test_in_flight_request_recovered_after_crash() {
    let db = TempDb::new("queue-crash");
    let store = open_store(&db).await;

    // Snapshot as left by a process that died mid-replay
    let mut stranded = QueuedRequest::new(
        "1700000000000_crashed01".to_string(),
        1_700_000_000_000,
        RequestKind::AiTask,
        QueuedPayload::new("generate shift report", TaskType::Report),
        3,
    );
    stranded.begin_attempt().unwrap();
    store
        .set(
            "offline_queue",
            &serde_json::to_string(&vec![stranded]).unwrap(),
        )
        .await
        .unwrap();

    let queue = load_queue(open_store(&db).await).await;
    let request = queue.get("1700000000000_crashed01").await.unwrap();
    assert_eq!(request.state, RequestState::Pending);
    assert_eq!(request.attempt_count, 0);

    // The recovered state is written back immediately
    let raw = open_store(&db)
        .await
        .get("offline_queue")
        .await
        .unwrap()
        .unwrap();
    let persisted: Vec<QueuedRequest> = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted[0].state, RequestState::Pending);
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_empty() {
    let db = TempDb::new("queue-corrupt");
    let store = open_store(&db).await;
    store.set("offline_queue", "{not json").await.unwrap();

    let queue = load_queue(store).await;
    assert!(queue.is_empty().await);

    // Still usable afterwards
    queue
        .enqueue(
            RequestKind::AiTask,
            QueuedPayload::new("retry later", TaskType::Report),
            None,
        )
        .await
        .unwrap();
    assert_eq!(load_queue(open_store(&db).await).await.len().await, 1);
}

#[tokio::test]
async fn test_cache_hydrates_after_restart() {
    let db = TempDb::new("cache-restart");
    let key = ResponseCache::derive_key("ai_response", &json!({ "prompt": "p", "type": "report" }));

    cache_over(open_store(&db).await)
        .set(&key, &json!({ "text": "cached answer" }), Some(Duration::from_secs(600)))
        .await;

    let cache = cache_over(open_store(&db).await);
    let stats = cache.stats().await;
    assert_eq!(stats.memory_entries, 0);
    assert_eq!(stats.durable_entries, 1);

    let value: serde_json::Value = cache.get(&key).await.unwrap();
    assert_eq!(value["text"], "cached answer");
    assert_eq!(cache.stats().await.memory_entries, 1);

    cache.clear().await;
    let cache = cache_over(open_store(&db).await);
    assert!(!cache.has(&key).await);
    assert_eq!(cache.stats().await.durable_entries, 0);
}

#[tokio::test]
async fn test_cache_and_queue_share_one_store() {
    let db = TempDb::new("shared-store");
    let store = open_store(&db).await;

    let cache = cache_over(store.clone());
    let queue = load_queue(store.clone()).await;

    cache.set("k", &json!(1), None).await;
    queue
        .enqueue(
            RequestKind::AiTask,
            QueuedPayload::new("p", TaskType::Report),
            None,
        )
        .await
        .unwrap();

    // Clearing the cache leaves the queue snapshot alone
    cache.clear().await;
    assert!(store.get("offline_queue").await.unwrap().is_some());
    assert_eq!(store.keys_with_prefix("nexus_cache_").await.unwrap().len(), 0);
}
