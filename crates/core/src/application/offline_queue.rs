// Durable Offline Queue
// Requests that could not reach the network, persisted until replayed

use crate::application::constants::{DEFAULT_MAX_ATTEMPTS, MAX_QUEUE_SIZE, QUEUE_STORAGE_KEY};
use crate::application::panic_guard::{execute_guarded, PanicGuardResult};
use crate::domain::{QueuedPayload, QueuedRequest, RequestId, RequestKind, RequestState};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, KeyValueStore, TimeProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Queue tunables
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub capacity: usize,
    pub default_max_attempts: u32,
    pub storage_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_QUEUE_SIZE,
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
            storage_key: QUEUE_STORAGE_KEY.to_string(),
        }
    }
}

/// Replay failure reported by a processor
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct ReplayFailure(pub String);

/// Replays one queued request
#[async_trait]
pub trait QueueProcessor: Send + Sync {
    async fn process(&self, request: &QueuedRequest) -> std::result::Result<(), ReplayFailure>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures that used up the last attempt
    pub exhausted: usize,
    /// Requests removed while their replay was in flight
    #[serde(default)]
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain was in progress; nothing was done
    AlreadyRunning,
    Completed(DrainReport),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub failed: usize,
    pub done: usize,
}

type Listener = Arc<dyn Fn(&[QueuedRequest]) + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: StdMutex<Vec<(u64, Listener)>>,
}

impl ListenerRegistry {
    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by [`OfflineQueue::subscribe`]
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Bounded, persisted FIFO of offline requests
///
/// Every mutation persists the full snapshot under one storage key and then
/// notifies subscribers with a copy of the queue.
pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: QueueConfig,
    requests: Mutex<Vec<QueuedRequest>>,
    draining: AtomicBool,
    listeners: Arc<ListenerRegistry>,
}

impl OfflineQueue {
    /// Load the persisted queue, resetting requests stranded in flight by a
    /// previous crash back to pending.
    ///
    /// A snapshot that cannot be parsed is discarded and the queue starts
    /// empty; a storage read failure is returned.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: QueueConfig,
    ) -> Result<Self> {
        let mut requests: Vec<QueuedRequest> = match store.get(&config.storage_key).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                error!(error = %e, "Corrupt offline queue snapshot discarded");
                Vec::new()
            }),
            None => Vec::new(),
        };

        let mut recovered = 0;
        for request in requests.iter_mut() {
            if request.recover() {
                info!(request_id = %request.id, "Stranded in-flight request reset to pending");
                recovered += 1;
            }
        }

        let queue = Self {
            store,
            id_provider,
            time_provider,
            config,
            requests: Mutex::new(requests),
            draining: AtomicBool::new(false),
            listeners: Arc::new(ListenerRegistry::default()),
        };

        if recovered > 0 {
            let requests = queue.requests.lock().await;
            queue.persist(&requests).await?;
        }

        let total = queue.len().await;
        info!(total = total, recovered = recovered, "Offline queue loaded");
        Ok(queue)
    }

    /// Append a pending request and persist before returning its id
    ///
    /// The oldest request is evicted when capacity is exceeded. If the
    /// snapshot cannot be persisted the queue is left unchanged.
    pub async fn enqueue(
        &self,
        kind: RequestKind,
        payload: QueuedPayload,
        max_attempts: Option<u32>,
    ) -> Result<RequestId> {
        let request = QueuedRequest::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            kind,
            payload,
            max_attempts
                .unwrap_or(self.config.default_max_attempts)
                .max(1),
        );
        let id = request.id.clone();
        let capacity = self.config.capacity.max(1);

        let evicted = self
            .commit(move |requests| {
                requests.push(request);
                let mut evicted = Vec::new();
                while requests.len() > capacity {
                    evicted.push(requests.remove(0).id);
                }
                (evicted, true)
            })
            .await?;

        for old in evicted {
            warn!(request_id = %old, "Offline queue full, evicted oldest request");
        }
        info!(request_id = %id, "Request queued for offline replay");
        Ok(id)
    }

    /// Replay every pending request serially, in enqueue order
    ///
    /// Returns `DrainOutcome::AlreadyRunning` without doing anything if a
    /// drain is in progress.
    pub async fn drain(&self, processor: &dyn QueueProcessor) -> DrainOutcome {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Drain already in progress, skipping");
            return DrainOutcome::AlreadyRunning;
        }
        let _guard = DrainGuard(&self.draining);

        let eligible: Vec<RequestId> = self
            .requests
            .lock()
            .await
            .iter()
            .filter(|r| r.is_replayable())
            .map(|r| r.id.clone())
            .collect();

        info!(eligible = eligible.len(), "Draining offline queue");
        let mut report = DrainReport::default();

        for id in eligible {
            let Some(request) = self
                .update_in_place(|requests| {
                    let request = requests
                        .iter_mut()
                        .find(|r| r.id == id && r.is_replayable())?;
                    request.begin_attempt().ok()?;
                    Some(request.clone())
                })
                .await
            else {
                // Removed or retried by someone else since the snapshot
                continue;
            };

            report.attempted += 1;
            let result = processor.process(&request).await;

            let settled = self.update_in_place(|requests| {
                let index = requests.iter().position(|r| r.id == id)?;
                match &result {
                    Ok(()) => {
                        let mut done = requests.remove(index);
                        if let Err(e) = done.complete() {
                            warn!(request_id = %id, error = %e, "Unexpected state after replay");
                        }
                        report.succeeded += 1;
                        info!(request_id = %id, "Queued request replayed");
                    }
                    Err(failure) => {
                        report.failed += 1;
                        match requests[index].record_failure(failure.0.clone()) {
                            Ok(RequestState::Failed) => {
                                report.exhausted += 1;
                                warn!(request_id = %id, error = %failure, "Queued request exhausted its attempts");
                            }
                            Ok(_) => {
                                warn!(request_id = %id, error = %failure, "Queued request replay failed, will retry");
                            }
                            Err(e) => {
                                warn!(request_id = %id, error = %e, "Unexpected state after replay");
                            }
                        }
                    }
                }
                Some(())
            })
            .await;
            if settled.is_none() {
                report.removed += 1;
                info!(request_id = %id, "Queued request removed during replay, outcome dropped");
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            exhausted = report.exhausted,
            removed = report.removed,
            "Offline queue drain finished"
        );
        DrainOutcome::Completed(report)
    }

    /// Reset a failed request to pending with a fresh attempt budget
    ///
    /// Returns false if the request exists but is not failed.
    pub async fn retry(&self, id: &str) -> Result<bool> {
        let outcome = self
            .commit(|requests| match requests.iter_mut().find(|r| r.id == id) {
                None => (None, false),
                Some(request) => {
                    let reset = request.reset_for_retry().is_ok();
                    (Some(reset), reset)
                }
            })
            .await?;

        match outcome {
            None => Err(AppError::NotFound(format!("queued request {id}"))),
            Some(reset) => {
                if reset {
                    info!(request_id = %id, "Failed request reset for retry");
                }
                Ok(reset)
            }
        }
    }

    /// Reset every failed request, returning how many were reset
    pub async fn retry_all(&self) -> Result<usize> {
        self.commit(|requests| {
            let reset = requests
                .iter_mut()
                .filter(|r| r.state == RequestState::Failed)
                .filter_map(|r| r.reset_for_retry().ok())
                .count();
            (reset, reset > 0)
        })
        .await
    }

    /// Remove one request; returns false if it was not queued
    pub async fn remove(&self, id: &str) -> Result<bool> {
        self.commit(|requests| {
            let before = requests.len();
            requests.retain(|r| r.id != id);
            let removed = requests.len() != before;
            (removed, removed)
        })
        .await
    }

    pub async fn clear_failed(&self) -> Result<usize> {
        self.commit(|requests| {
            let before = requests.len();
            requests.retain(|r| r.state != RequestState::Failed);
            let removed = before - requests.len();
            (removed, removed > 0)
        })
        .await
    }

    /// Drop every request, returning how many there were
    pub async fn clear_all(&self) -> Result<usize> {
        self.commit(|requests| {
            let removed = requests.len();
            requests.clear();
            (removed, true)
        })
        .await
    }

    /// Snapshot copy of the queue
    pub async fn list(&self) -> Vec<QueuedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<QueuedRequest> {
        self.requests.lock().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn pending_count(&self) -> usize {
        self.count_in(RequestState::Pending).await
    }

    pub async fn failed_count(&self) -> usize {
        self.count_in(RequestState::Failed).await
    }

    pub async fn len(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.lock().await.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> QueueStats {
        let requests = self.requests.lock().await;
        let mut stats = QueueStats {
            total: requests.len(),
            ..QueueStats::default()
        };
        for request in requests.iter() {
            match request.state {
                RequestState::Pending => stats.pending += 1,
                RequestState::InFlight => stats.in_flight += 1,
                RequestState::Failed => stats.failed += 1,
                RequestState::Done => stats.done += 1,
            }
        }
        stats
    }

    /// Register `listener`; it receives a copy of the queue after every mutation
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[QueuedRequest]) + Send + Sync + 'static,
    {
        let id = self.listeners.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.listeners),
        }
    }

    async fn count_in(&self, state: RequestState) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.state == state)
            .count()
    }

    /// All-or-nothing mutation: applied to a copy, persisted, then swapped in.
    ///
    /// `f` returns its result and whether anything changed; unchanged queues
    /// are neither persisted nor announced.
    async fn commit<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Vec<QueuedRequest>) -> (R, bool),
    {
        let mut requests = self.requests.lock().await;
        let mut next = requests.clone();
        let (result, changed) = f(&mut next);

        if changed {
            self.persist(&next).await?;
            *requests = next;
            let snapshot = requests.clone();
            drop(requests);
            self.notify(&snapshot);
        }

        Ok(result)
    }

    /// Drain-path mutation: applied in memory, persisted best-effort.
    async fn update_in_place<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Vec<QueuedRequest>) -> Option<R>,
    {
        let mut requests = self.requests.lock().await;
        let result = f(&mut requests)?;

        if let Err(e) = self.persist(&requests).await {
            warn!(error = %e, "Failed to persist offline queue during drain");
        }
        let snapshot = requests.clone();
        drop(requests);
        self.notify(&snapshot);

        Some(result)
    }

    async fn persist(&self, requests: &[QueuedRequest]) -> Result<()> {
        let raw = serde_json::to_string(requests)?;
        self.store.set(&self.config.storage_key, &raw).await
    }

    fn notify(&self, snapshot: &[QueuedRequest]) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            if let PanicGuardResult::Panicked(msg) =
                execute_guarded(AssertUnwindSafe(|| listener(snapshot)))
            {
                warn!(panic_msg = %msg, "Offline queue listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::key_value_store::mocks::MemoryKeyValueStore;
    use crate::port::time_provider::mocks::MockTimeProvider;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    async fn queue_with(store: Arc<MemoryKeyValueStore>, config: QueueConfig) -> OfflineQueue {
        OfflineQueue::load(
            store,
            Arc::new(SequentialIdProvider::new()),
            Arc::new(MockTimeProvider::new(1_000)),
            config,
        )
        .await
        .unwrap()
    }

    async fn queue() -> (OfflineQueue, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        (queue_with(store.clone(), QueueConfig::default()).await, store)
    }

    fn payload(prompt: &str) -> QueuedPayload {
        QueuedPayload::new(prompt, TaskType::Diagnostic)
    }

    /// Records prompts in call order
    #[derive(Default)]
    struct Recorder {
        prompts: StdMutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueueProcessor for Recorder {
        async fn process(&self, request: &QueuedRequest) -> std::result::Result<(), ReplayFailure> {
            assert_eq!(request.state, RequestState::InFlight);
            self.prompts.lock().unwrap().push(request.payload.prompt.clone());
            if self.fail {
                Err(ReplayFailure("backend still down".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_enqueue_persists_and_counts() {
        let (queue, store) = queue().await;
        let id = queue
            .enqueue(RequestKind::AiTask, payload("a"), None)
            .await
            .unwrap();

        assert_eq!(id, "req-1");
        assert_eq!(queue.pending_count().await, 1);

        let persisted: Vec<QueuedRequest> =
            serde_json::from_str(&store.raw(QUEUE_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(persisted[0].enqueued_at, 1_000);
    }

    #[tokio::test]
    async fn test_drain_in_enqueue_order() {
        let (queue, _) = queue().await;
        queue.enqueue(RequestKind::AiTask, payload("A"), None).await.unwrap();
        queue.enqueue(RequestKind::AiTask, payload("B"), None).await.unwrap();

        let recorder = Recorder::default();
        let outcome = queue.drain(&recorder).await;

        assert_eq!(recorder.prompts(), vec!["A", "B"]);
        assert_eq!(
            outcome,
            DrainOutcome::Completed(DrainReport {
                attempted: 2,
                succeeded: 2,
                failed: 0,
                exhausted: 0,
                removed: 0,
            })
        );
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_exhaustion_requires_manual_retry() {
        let (queue, _) = queue().await;
        let id = queue
            .enqueue(RequestKind::AiTask, payload("A"), Some(2))
            .await
            .unwrap();
        let recorder = Recorder::failing();

        queue.drain(&recorder).await;
        assert_eq!(queue.get(&id).await.unwrap().state, RequestState::Pending);

        let outcome = queue.drain(&recorder).await;
        let request = queue.get(&id).await.unwrap();
        assert_eq!(request.state, RequestState::Failed);
        assert_eq!(request.attempt_count, 2);
        assert_eq!(request.last_error.as_deref(), Some("backend still down"));
        assert!(matches!(outcome, DrainOutcome::Completed(r) if r.exhausted == 1));

        queue.drain(&recorder).await;
        assert_eq!(recorder.prompts().len(), 2);

        assert!(queue.retry(&id).await.unwrap());
        queue.drain(&recorder).await;
        assert_eq!(recorder.prompts().len(), 3);
        assert_eq!(queue.get(&id).await.unwrap().attempt_count, 1);
    }

    #[tokio::test]
    async fn test_crash_recovery_resets_in_flight() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let mut stranded = QueuedRequest::new("x", 5, RequestKind::AiTask, payload("A"), 3);
        stranded.begin_attempt().unwrap();
        store.insert_raw(
            QUEUE_STORAGE_KEY,
            &serde_json::to_string(&vec![stranded]).unwrap(),
        );

        let queue = queue_with(store.clone(), QueueConfig::default()).await;
        assert_eq!(queue.get("x").await.unwrap().state, RequestState::Pending);

        let persisted: Vec<QueuedRequest> =
            serde_json::from_str(&store.raw(QUEUE_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(persisted[0].state, RequestState::Pending);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.insert_raw(QUEUE_STORAGE_KEY, "[{broken");
        let queue = queue_with(store, QueueConfig::default()).await;
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let config = QueueConfig {
            capacity: 3,
            ..QueueConfig::default()
        };
        let queue = queue_with(store, config).await;
        for prompt in ["1", "2", "3", "4"] {
            queue.enqueue(RequestKind::AiTask, payload(prompt), None).await.unwrap();
        }

        let prompts: Vec<_> = queue
            .list()
            .await
            .into_iter()
            .map(|r| r.payload.prompt)
            .collect();
        assert_eq!(prompts, vec!["2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_degenerate_limits_are_clamped() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let config = QueueConfig {
            capacity: 0,
            ..QueueConfig::default()
        };
        let queue = queue_with(store, config).await;

        let id = queue
            .enqueue(RequestKind::AiTask, payload("A"), Some(0))
            .await
            .unwrap();

        let request = queue.get(&id).await.unwrap();
        assert_eq!(request.max_attempts, 1);
        assert!(request.is_replayable());

        let recorder = Recorder::failing();
        let outcome = queue.drain(&recorder).await;
        assert!(matches!(outcome, DrainOutcome::Completed(r) if r.exhausted == 1));
        assert_eq!(queue.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_enqueue_fails_when_storage_fails() {
        let (queue, store) = queue().await;
        store.fail_writes(true);

        let result = queue.enqueue(RequestKind::AiTask, payload("A"), None).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let (queue, _) = queue().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let last_len = Arc::new(AtomicUsize::new(0));

        let subscription = {
            let calls = calls.clone();
            let last_len = last_len.clone();
            queue.subscribe(move |snapshot| {
                calls.fetch_add(1, Ordering::SeqCst);
                last_len.store(snapshot.len(), Ordering::SeqCst);
            })
        };

        queue.enqueue(RequestKind::AiTask, payload("A"), None).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(last_len.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        queue.enqueue(RequestKind::AiTask, payload("B"), None).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_listener_is_isolated() {
        let (queue, _) = queue().await;
        let calls = Arc::new(AtomicUsize::new(0));

        let _bad = queue.subscribe(|_| panic!("listener bug"));
        let _good = {
            let calls = calls.clone();
            queue.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        queue.enqueue(RequestKind::AiTask, payload("A"), None).await.unwrap();
        assert_eq!(queue.len().await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Blocks inside `process` until released
    struct BlockingProcessor {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl QueueProcessor for BlockingProcessor {
        async fn process(&self, _request: &QueuedRequest) -> std::result::Result<(), ReplayFailure> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reentrant_drain_is_noop() {
        let (queue, _) = queue().await;
        let queue = Arc::new(queue);
        queue.enqueue(RequestKind::AiTask, payload("A"), None).await.unwrap();

        let processor = Arc::new(BlockingProcessor {
            entered: Notify::new(),
            release: Notify::new(),
        });

        let first = {
            let queue = queue.clone();
            let processor = processor.clone();
            tokio::spawn(async move { queue.drain(processor.as_ref()).await })
        };

        processor.entered.notified().await;
        assert!(queue.is_draining());
        assert_eq!(queue.stats().await.in_flight, 1);

        let recorder = Recorder::default();
        assert_eq!(queue.drain(&recorder).await, DrainOutcome::AlreadyRunning);
        assert!(recorder.prompts().is_empty());

        processor.release.notify_one();
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, DrainOutcome::Completed(r) if r.succeeded == 1));
        assert!(!queue.is_draining());
    }

    #[tokio::test]
    async fn test_removal_during_replay_is_counted() {
        let (queue, _) = queue().await;
        let queue = Arc::new(queue);
        let id = queue.enqueue(RequestKind::AiTask, payload("A"), None).await.unwrap();

        let processor = Arc::new(BlockingProcessor {
            entered: Notify::new(),
            release: Notify::new(),
        });

        let drain = {
            let queue = queue.clone();
            let processor = processor.clone();
            tokio::spawn(async move { queue.drain(processor.as_ref()).await })
        };

        processor.entered.notified().await;
        assert!(queue.remove(&id).await.unwrap());
        processor.release.notify_one();

        let outcome = drain.await.unwrap();
        let DrainOutcome::Completed(report) = outcome else {
            panic!("drain did not run: {outcome:?}");
        };
        assert_eq!(report.attempted, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(
            report.attempted,
            report.succeeded + report.failed + report.removed
        );
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_management_operations() {
        let (queue, _) = queue().await;
        let a = queue.enqueue(RequestKind::AiTask, payload("A"), Some(1)).await.unwrap();
        let b = queue.enqueue(RequestKind::AiTask, payload("B"), Some(1)).await.unwrap();
        let c = queue.enqueue(RequestKind::AiTask, payload("C"), Some(1)).await.unwrap();

        queue.drain(&Recorder::failing()).await;
        assert_eq!(queue.failed_count().await, 3);

        // Pending requests are not "retried"
        assert!(queue.retry(&a).await.unwrap());
        assert!(!queue.retry(&a).await.unwrap());
        assert!(matches!(queue.retry("missing").await, Err(AppError::NotFound(_))));

        assert_eq!(queue.retry_all().await.unwrap(), 2);
        assert_eq!(queue.pending_count().await, 3);

        assert!(queue.remove(&b).await.unwrap());
        assert!(!queue.remove(&b).await.unwrap());

        queue.drain(&Recorder::failing()).await;
        assert_eq!(queue.clear_failed().await.unwrap(), 2);
        assert!(queue.get(&c).await.is_none());

        queue.enqueue(RequestKind::AiTask, payload("D"), None).await.unwrap();
        assert_eq!(queue.clear_all().await.unwrap(), 1);
        assert_eq!(queue.stats().await, QueueStats::default());
    }
}
