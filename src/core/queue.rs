//! Spin queue and its serialized drain loop
//!
//! `SpinQueue` owns the pending batches and the single `draining` flag.
//! `enqueue` appends and, under the same lock, claims the flag if no drain
//! is running, so at most one drain task exists at any time. The drain task
//! pops the oldest batch, reloads the prize table, resolves every spin,
//! publishes one `spin_request`, then waits out the pacing delay before
//! looking at the queue again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use crate::config::{ConfigPort, PacingConfig};
use crate::core::broadcast::{BroadcastHub, Subscription};
use crate::core::engine::{DrawSource, ProbabilityEngine, RandomDraw};
use crate::core::pacing::{pacing_delay, Pacer, TokioPacer};
use crate::core::types::{PrizeItem, QueueStatus, ServerEvent, SpinBatchRequest};
use crate::error::{AppError, Result};

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<SpinBatchRequest>,
    draining: bool,
}

impl QueueState {
    fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_length: self.pending.len(),
            is_processing: self.draining,
        }
    }
}

struct Inner {
    state: Mutex<QueueState>,
    store: Arc<dyn ConfigPort>,
    hub: Arc<BroadcastHub>,
    pacer: Arc<dyn Pacer>,
    draws: Mutex<Box<dyn DrawSource>>,
    pacing: PacingConfig,
    /// Last table loaded successfully; used only when a reload fails.
    last_table: Mutex<Option<Vec<PrizeItem>>>,
    active_drains: AtomicUsize,
    peak_drains: AtomicUsize,
}

/// Handle to the spin queue service. Cheap to clone.
#[derive(Clone)]
pub struct SpinQueue {
    inner: Arc<Inner>,
}

impl SpinQueue {
    /// Queue with real time pacing and an entropy-seeded draw source.
    pub fn new(store: Arc<dyn ConfigPort>, hub: Arc<BroadcastHub>, pacing: PacingConfig) -> Self {
        Self::with_parts(
            store,
            hub,
            pacing,
            Arc::new(TokioPacer),
            Box::new(RandomDraw::from_entropy()),
        )
    }

    pub fn with_parts(
        store: Arc<dyn ConfigPort>,
        hub: Arc<BroadcastHub>,
        pacing: PacingConfig,
        pacer: Arc<dyn Pacer>,
        draws: Box<dyn DrawSource>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                store,
                hub,
                pacer,
                draws: Mutex::new(draws),
                pacing,
                last_table: Mutex::new(None),
                active_drains: AtomicUsize::new(0),
                peak_drains: AtomicUsize::new(0),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a batch and start a drain if none is running.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `InvalidSpin` for a batch with no spins.
    pub fn enqueue(&self, batch: SpinBatchRequest) -> Result<QueueStatus> {
        if batch.spins < 1 {
            return Err(AppError::InvalidSpin(format!(
                "batch for '{}' has no spins",
                batch.user
            )));
        }

        let (start_drain, status) = {
            let mut state = self.state();
            state.pending.push_back(batch);
            let start_drain = !state.draining;
            state.draining = true;
            (start_drain, state.status())
        };

        if start_drain {
            let queue = self.clone();
            tokio::spawn(async move { queue.drain().await });
        }

        Ok(status)
    }

    /// Read-only snapshot.
    pub fn status(&self) -> QueueStatus {
        self.state().status()
    }

    /// Register a hub subscriber whose baseline is `leading` followed by the
    /// current queue status.
    ///
    /// Status events are only published under the queue lock, so holding it
    /// here means no status change can land between the snapshot and
    /// registration.
    pub fn subscribe_viewer<I>(&self, leading: I) -> Subscription
    where
        I: IntoIterator<Item = ServerEvent>,
    {
        let state = self.state();
        let baseline = leading
            .into_iter()
            .chain(std::iter::once(state.status().into()));
        self.inner.hub.subscribe(baseline)
    }

    /// Drop every batch not yet popped by the drain loop.
    ///
    /// A batch already being broadcast finishes normally. Returns how many
    /// batches were discarded.
    pub fn clear(&self) -> usize {
        let mut state = self.state();
        let discarded = state.pending.len();
        state.pending.clear();
        self.inner.hub.publish(state.status().into());
        drop(state);

        info!(discarded = discarded, "Queue cleared");
        discarded
    }

    /// Number of drain tasks currently running (0 or 1).
    pub fn active_drains(&self) -> usize {
        self.inner.active_drains.load(Ordering::SeqCst)
    }

    /// Highest number of drain tasks ever observed running at once.
    pub fn peak_concurrent_drains(&self) -> usize {
        self.inner.peak_drains.load(Ordering::SeqCst)
    }

    async fn drain(self) {
        let active = self.inner.active_drains.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_drains.fetch_max(active, Ordering::SeqCst);
        self.publish_status();

        loop {
            let batch = {
                let mut state = self.state();
                match state.pending.pop_front() {
                    Some(batch) => {
                        self.inner.hub.publish(state.status().into());
                        batch
                    }
                    None => {
                        // Release the flag and announce idle under the same lock
                        // so a concurrent enqueue either lands before this point
                        // or starts a fresh drain after it.
                        self.inner.active_drains.fetch_sub(1, Ordering::SeqCst);
                        state.draining = false;
                        self.inner.hub.publish(state.status().into());
                        break;
                    }
                }
            };

            self.process_batch(batch).await;
        }

        info!("Spin queue drained");
    }

    async fn process_batch(&self, batch: SpinBatchRequest) {
        info!(
            user = %batch.user,
            spins = batch.spins,
            gift = %batch.gift_name,
            coin = batch.coin,
            "Processing spin batch"
        );

        let Some(table) = self.current_table().await else {
            error!(user = %batch.user, "No prize table available, skipping batch");
            return;
        };

        let resolved = {
            let mut draws = self
                .inner
                .draws
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            ProbabilityEngine::resolve_many(&table, batch.spins, &mut **draws)
        };

        let results = match resolved {
            Ok(results) => results,
            Err(e) => {
                error!(user = %batch.user, error = %e, "Prize resolution failed, skipping batch");
                return;
            }
        };

        for (index, prize) in results.iter().enumerate() {
            info!(
                user = %batch.user,
                spin = index + 1,
                prize = %prize.label,
                value = prize.value,
                "Spin resolved"
            );
        }

        let viewers = self.inner.hub.publish(ServerEvent::SpinRequest {
            user: batch.user.clone(),
            spins: batch.spins,
            gift_name: batch.gift_name.clone(),
            coin: batch.coin,
            prize_results: results,
        });

        let delay = pacing_delay(&self.inner.pacing, batch.spins);
        info!(
            user = %batch.user,
            viewers = viewers,
            delay_ms = delay.as_millis() as u64,
            "Spin request broadcast, pacing"
        );
        self.inner.pacer.pause(delay).await;
    }

    /// Reload the prize table, falling back to the last good one on failure.
    async fn current_table(&self) -> Option<Vec<PrizeItem>> {
        match self.inner.store.load().await {
            Ok(items) => {
                *self
                    .inner
                    .last_table
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(items.clone());
                Some(items)
            }
            Err(e) => {
                let fallback = self
                    .inner
                    .last_table
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                warn!(
                    error = %e,
                    has_fallback = fallback.is_some(),
                    "Prize table reload failed"
                );
                fallback
            }
        }
    }

    fn publish_status(&self) {
        let state = self.state();
        self.inner.hub.publish(state.status().into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use crate::core::engine::ScriptedDraw;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn table() -> Vec<PrizeItem> {
        vec![PrizeItem::new("A", 30.0, 1), PrizeItem::new("B", 70.0, 2)]
    }

    fn fast_pacing() -> PacingConfig {
        PacingConfig {
            per_spin_ms: 1_000,
            buffer_ms: 500,
        }
    }

    fn queue_with(store: Arc<dyn ConfigPort>, draws: Vec<f64>) -> (SpinQueue, Arc<BroadcastHub>) {
        let hub = Arc::new(BroadcastHub::new(1024));
        let queue = SpinQueue::with_parts(
            store,
            hub.clone(),
            fast_pacing(),
            Arc::new(TokioPacer),
            Box::new(ScriptedDraw::new(draws)),
        );
        (queue, hub)
    }

    fn batch(user: &str, coins: u64) -> SpinBatchRequest {
        SpinBatchRequest::from_coins(user, "Rose", coins).unwrap()
    }

    fn drain_events(sub: &mut Subscription) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = sub.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn spin_users(events: &[ServerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                ServerEvent::SpinRequest { user, .. } => Some(user.clone()),
                _ => None,
            })
            .collect()
    }

    fn status_of(is_processing: bool, queue_length: usize) -> ServerEvent {
        ServerEvent::QueueStatus(QueueStatus {
            queue_length,
            is_processing,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_batch_lifecycle() {
        let (queue, hub) = queue_with(Arc::new(MemoryStore::new(table())), vec![25.0, 95.0]);
        let mut sub = hub.subscribe([]);

        assert_eq!(queue.status(), QueueStatus::IDLE);
        let status = queue.enqueue(batch("alice", 25)).unwrap();
        assert_eq!(
            status,
            QueueStatus {
                queue_length: 1,
                is_processing: true
            }
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            queue.status(),
            QueueStatus {
                queue_length: 0,
                is_processing: true
            }
        );

        // 2 spins * 1000ms + 500ms
        tokio::time::sleep(Duration::from_millis(2_600)).await;
        assert_eq!(queue.status(), QueueStatus::IDLE);

        let events = drain_events(&mut sub);
        assert_eq!(
            events,
            vec![
                status_of(true, 1),
                status_of(true, 0),
                ServerEvent::SpinRequest {
                    user: "alice".into(),
                    spins: 2,
                    gift_name: "Rose".into(),
                    coin: 25,
                    prize_results: table(),
                },
                status_of(false, 0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_delay_holds_next_batch() {
        let (queue, hub) = queue_with(Arc::new(MemoryStore::new(table())), vec![10.0]);
        let mut sub = hub.subscribe([]);

        queue.enqueue(batch("first", 10)).unwrap();
        queue.enqueue(batch("second", 10)).unwrap();

        // First batch paces for 1500ms; second must not be out yet
        tokio::time::sleep(Duration::from_millis(1_400)).await;
        assert_eq!(spin_users(&drain_events(&mut sub)), ["first"]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(spin_users(&drain_events(&mut sub)), ["second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_drain_in_fifo_order() {
        let (queue, hub) = queue_with(Arc::new(MemoryStore::new(table())), vec![10.0]);
        let mut sub = hub.subscribe([]);

        for user in ["u1", "u2", "u3", "u4"] {
            queue.enqueue(batch(user, 10)).unwrap();
        }
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(spin_users(&drain_events(&mut sub)), ["u1", "u2", "u3", "u4"]);
        assert_eq!(queue.status(), QueueStatus::IDLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_enqueue_never_starts_second_drain() {
        let (queue, _hub) = queue_with(Arc::new(MemoryStore::new(table())), vec![50.0]);

        let mut handles = Vec::new();
        for i in 0..32 {
            let q = queue.clone();
            handles.push(tokio::spawn(async move {
                q.enqueue(batch(&format!("user{}", i), 10)).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for _ in 0..10 {
            assert!(queue.active_drains() <= 1);
            tokio::time::sleep(Duration::from_millis(700)).await;
        }
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(queue.peak_concurrent_drains(), 1);
        assert_eq!(queue.active_drains(), 0);
        assert_eq!(queue.status(), QueueStatus::IDLE);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_enqueue_on_threads_keeps_one_drain() {
        let hub = Arc::new(BroadcastHub::new(4096));
        let queue = SpinQueue::with_parts(
            Arc::new(MemoryStore::new(table())),
            hub,
            PacingConfig {
                per_spin_ms: 1,
                buffer_ms: 0,
            },
            Arc::new(TokioPacer),
            Box::new(ScriptedDraw::new(vec![50.0])),
        );

        let mut handles = Vec::new();
        for i in 0..64 {
            let q = queue.clone();
            handles.push(tokio::spawn(async move {
                q.enqueue(batch(&format!("user{}", i), 10)).unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while queue.status() != QueueStatus::IDLE && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(queue.status(), QueueStatus::IDLE);
        assert_eq!(queue.peak_concurrent_drains(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_while_draining_is_picked_up_by_running_loop() {
        let (queue, hub) = queue_with(Arc::new(MemoryStore::new(table())), vec![10.0]);
        let mut sub = hub.subscribe([]);

        queue.enqueue(batch("first", 10)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let status = queue.enqueue(batch("late", 10)).unwrap();
        assert_eq!(
            status,
            QueueStatus {
                queue_length: 1,
                is_processing: true
            }
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(spin_users(&drain_events(&mut sub)), ["first", "late"]);
        assert_eq!(queue.peak_concurrent_drains(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_while_idle() {
        let (queue, hub) = queue_with(Arc::new(MemoryStore::new(table())), vec![10.0]);
        let mut sub = hub.subscribe([]);

        assert_eq!(queue.clear(), 0);
        assert_eq!(queue.status().queue_length, 0);
        assert_eq!(drain_events(&mut sub), vec![status_of(false, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_while_draining_keeps_in_flight_batch() {
        let (queue, hub) = queue_with(Arc::new(MemoryStore::new(table())), vec![10.0]);
        let mut sub = hub.subscribe([]);

        queue.enqueue(batch("in_flight", 30)).unwrap();
        queue.enqueue(batch("dropped1", 10)).unwrap();
        queue.enqueue(batch("dropped2", 10)).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(queue.status().queue_length, 2);

        assert_eq!(queue.clear(), 2);
        assert_eq!(
            queue.status(),
            QueueStatus {
                queue_length: 0,
                is_processing: true
            }
        );

        // In-flight batch still paces its full 3 * 1000 + 500ms
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert!(queue.status().is_processing);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(queue.status(), QueueStatus::IDLE);

        let events = drain_events(&mut sub);
        assert_eq!(spin_users(&events), ["in_flight"]);
        let idle_count = events.iter().filter(|e| **e == status_of(false, 0)).count();
        assert_eq!(idle_count, 1, "Events: {:?}", events);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_zero_spin_batch() {
        let (queue, _hub) = queue_with(Arc::new(MemoryStore::new(table())), vec![10.0]);
        let mut empty = batch("x", 10);
        empty.spins = 0;

        assert!(matches!(queue.enqueue(empty), Err(AppError::InvalidSpin(_))));
        assert_eq!(queue.status(), QueueStatus::IDLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prize_table_reloaded_per_batch() {
        let store = Arc::new(MemoryStore::new(vec![PrizeItem::new("old", 100.0, 0)]));
        let (queue, hub) = queue_with(store.clone(), vec![10.0]);
        let mut sub = hub.subscribe([]);

        queue.enqueue(batch("first", 10)).unwrap();
        queue.enqueue(batch("second", 10)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.save(vec![PrizeItem::new("new", 100.0, 0)]).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let labels: Vec<String> = drain_events(&mut sub)
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::SpinRequest { prize_results, .. } => {
                    Some(prize_results[0].label.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(labels, ["old", "new"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_table_skips_batch_without_losing_others() {
        let store = Arc::new(MemoryStore::new(vec![]));
        let (queue, hub) = queue_with(store.clone(), vec![10.0]);
        let mut sub = hub.subscribe([]);

        queue.enqueue(batch("skipped", 10)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(queue.status(), QueueStatus::IDLE);

        store.save(table()).await.unwrap();
        queue.enqueue(batch("served", 10)).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(spin_users(&drain_events(&mut sub)), ["served"]);
    }

    /// Store that serves one table, then fails every reload.
    struct FlakyStore {
        failed: AtomicBool,
    }

    #[async_trait]
    impl ConfigPort for FlakyStore {
        async fn load(&self) -> Result<Vec<PrizeItem>> {
            if self.failed.swap(true, Ordering::SeqCst) {
                Err(AppError::Store("disk gone".into()))
            } else {
                Ok(vec![PrizeItem::new("cached", 100.0, 7)])
            }
        }

        async fn save(&self, _items: Vec<PrizeItem>) -> Result<()> {
            Ok(())
        }

        fn target_identity(&self) -> String {
            String::new()
        }

        fn set_target_identity(&self, _identity: String) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_failure_falls_back_to_last_table() {
        let store = Arc::new(FlakyStore {
            failed: AtomicBool::new(false),
        });
        let (queue, hub) = queue_with(store, vec![10.0]);
        let mut sub = hub.subscribe([]);

        queue.enqueue(batch("first", 10)).unwrap();
        queue.enqueue(batch("second", 10)).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let events = drain_events(&mut sub);
        assert_eq!(spin_users(&events), ["first", "second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_failure_without_fallback_skips() {
        let store = Arc::new(FlakyStore {
            failed: AtomicBool::new(true),
        });
        let (queue, hub) = queue_with(store, vec![10.0]);
        let mut sub = hub.subscribe([]);

        queue.enqueue(batch("lost", 10)).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(spin_users(&drain_events(&mut sub)).is_empty());
        assert_eq!(queue.status(), QueueStatus::IDLE);
    }

    /// Pacer that records requested delays and returns immediately.
    #[derive(Default)]
    struct RecordingPacer {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }

    #[tokio::test]
    async fn test_pacing_delay_is_per_spin_times_count_plus_buffer() {
        let pacer = Arc::new(RecordingPacer::default());
        let queue = SpinQueue::with_parts(
            Arc::new(MemoryStore::new(table())),
            Arc::new(BroadcastHub::default()),
            fast_pacing(),
            pacer.clone(),
            Box::new(ScriptedDraw::new(vec![10.0])),
        );

        queue.enqueue(batch("a", 10)).unwrap();
        queue.enqueue(batch("b", 45)).unwrap();
        while queue.status() != QueueStatus::IDLE {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            *pacer.delays.lock().unwrap(),
            vec![Duration::from_millis(1_500), Duration::from_millis(4_500)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_baseline_reflects_queue() {
        let (queue, _hub) = queue_with(Arc::new(MemoryStore::new(table())), vec![50.0]);
        queue.enqueue(batch("alice", 10)).unwrap();
        queue.enqueue(batch("bob", 10)).unwrap();

        let mut viewer = queue.subscribe_viewer([ServerEvent::system("hello")]);
        assert_eq!(
            drain_events(&mut viewer),
            vec![ServerEvent::system("hello"), status_of(true, 2)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_viewer_baseline_never_goes_stale() {
        let hub = Arc::new(BroadcastHub::new(4096));
        let queue = SpinQueue::with_parts(
            Arc::new(MemoryStore::new(table())),
            hub,
            PacingConfig {
                per_spin_ms: 0,
                buffer_ms: 0,
            },
            Arc::new(TokioPacer),
            Box::new(ScriptedDraw::new(vec![50.0])),
        );

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    queue.enqueue(batch(&format!("user{}", i), 10)).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut viewers = Vec::new();
        for _ in 0..200 {
            viewers.push(queue.subscribe_viewer([]));
            tokio::task::yield_now().await;
        }
        producer.await.unwrap();

        while queue.status() != QueueStatus::IDLE {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Every viewer's most recent status must be the final idle one
        for mut viewer in viewers {
            let last_status = drain_events(&mut viewer)
                .into_iter()
                .rev()
                .find(|e| matches!(e, ServerEvent::QueueStatus(_)));
            assert_eq!(last_status, Some(status_of(false, 0)));
        }
    }
}
