//! Single-flight polling loop.
//!
//! One cycle fetches a batch from the session feed, reconciles it into the
//! registry and, at most once per save interval, persists a snapshot. The
//! next cycle starts one poll interval after the previous one completed.

use std::sync::Arc;
use std::time::Duration;

use camsync_platforms::extractor::SessionFeed;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::debounce::{Clock, Debouncer};
use crate::persistence::SnapshotStore;
use crate::registry::{ReconcileReport, SessionRegistry};
use crate::Result;

/// Broadcast channel capacity for cycle events.
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl SchedulerState {
    /// True while a loop is alive and not cancelled.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Scheduled | Self::Running | Self::Succeeded | Self::Failed
        )
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleEvent {
    Succeeded(ReconcileReport),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Minimum spacing of snapshot saves.
    pub save_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            save_interval: Duration::from_secs(30),
        }
    }
}

struct Control {
    state: SchedulerState,
    generation: u64,
    cancel_token: Option<CancellationToken>,
}

struct Shared {
    feed: Arc<dyn SessionFeed>,
    registry: Arc<SessionRegistry>,
    store: Arc<dyn SnapshotStore>,
    debouncer: Debouncer,
    poll_interval: Duration,
    control: Mutex<Control>,
    // held for the duration of a cycle
    flight: tokio::sync::Mutex<()>,
    events: broadcast::Sender<CycleEvent>,
}

/// Drives the session feed on a fixed period.
///
/// `start` and `cancel` are idempotent. Cancelling never interrupts a cycle
/// that is already running; it only prevents the next one. A loop started
/// right after a cancel waits for the previous loop's cycle to finish.
#[derive(Clone)]
pub struct PollingScheduler {
    shared: Arc<Shared>,
}

impl PollingScheduler {
    pub fn new(
        feed: Arc<dyn SessionFeed>,
        registry: Arc<SessionRegistry>,
        store: Arc<dyn SnapshotStore>,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                feed,
                registry,
                store,
                debouncer: Debouncer::new(config.save_interval, clock),
                poll_interval: config.poll_interval,
                control: Mutex::new(Control {
                    state: SchedulerState::Idle,
                    generation: 0,
                    cancel_token: None,
                }),
                flight: tokio::sync::Mutex::new(()),
                events,
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.control.lock().state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.shared.events.subscribe()
    }

    /// Spawns the polling loop. Returns `false` when a loop is already active.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let (generation, token) = {
            let mut control = self.shared.control.lock();
            if control.state.is_active() {
                debug!(state = %control.state, "Scheduler already active");
                return false;
            }
            control.generation += 1;
            let token = CancellationToken::new();
            control.cancel_token = Some(token.clone());
            control.state = SchedulerState::Scheduled;
            (control.generation, token)
        };

        info!(
            platform = %self.shared.feed.platform_name(),
            generation,
            "Polling started"
        );
        tokio::spawn(self.shared.clone().run(generation, token));
        true
    }

    /// Starts a new save window after a snapshot was written outside the
    /// loop.
    pub fn restart_save_window(&self) {
        self.shared.debouncer.reset();
    }

    /// Stops scheduling further cycles. Returns `false` when nothing was
    /// running.
    pub fn cancel(&self) -> bool {
        let mut control = self.shared.control.lock();
        if !control.state.is_active() {
            return false;
        }
        if let Some(token) = control.cancel_token.take() {
            token.cancel();
        }
        control.state = SchedulerState::Cancelled;
        info!(generation = control.generation, "Polling cancelled");
        true
    }
}

impl Shared {
    async fn run(self: Arc<Self>, generation: u64, token: CancellationToken) {
        loop {
            let outcome = {
                let _flight = self.flight.lock().await;
                // cancelled while a previous loop was finishing its cycle
                if token.is_cancelled() || !self.transition(generation, SchedulerState::Running) {
                    break;
                }
                self.run_cycle().await
            };

            let event = match outcome {
                Ok(report) => {
                    self.transition(generation, SchedulerState::Succeeded);
                    CycleEvent::Succeeded(report)
                }
                Err(e) => {
                    warn!(error = %e, "Poll cycle failed");
                    self.transition(generation, SchedulerState::Failed);
                    CycleEvent::Failed(e.to_string())
                }
            };
            // no subscribers is fine
            let _ = self.events.send(event);

            if !self.transition(generation, SchedulerState::Scheduled) {
                break;
            }
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        debug!(generation, "Polling loop stopped");
    }

    /// Sets the state unless this loop has been cancelled or superseded.
    fn transition(&self, generation: u64, state: SchedulerState) -> bool {
        let mut control = self.control.lock();
        let current = control.generation == generation
            && control
                .cancel_token
                .as_ref()
                .is_some_and(|token| !token.is_cancelled());
        if current {
            control.state = state;
        }
        current
    }

    async fn run_cycle(&self) -> Result<ReconcileReport> {
        let batch = self.feed.fetch_batch().await?;
        let report = self.registry.reconcile(batch);

        if self.debouncer.ready() {
            let snapshot = self.registry.snapshot();
            if let Err(e) = self.store.save(&snapshot).await {
                warn!(error = %e, "Failed to save session snapshot");
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemorySnapshotStore;
    use crate::scheduler::debounce::{ManualClock, SystemClock};
    use async_trait::async_trait;
    use camsync_platforms::{PlatformError, SessionState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Feed that returns `uid = call number` and tracks overlapping calls.
    #[derive(Default)]
    struct ProbeFeed {
        delay: Duration,
        fail_every: Option<usize>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ProbeFeed {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionFeed for ProbeFeed {
        fn platform_name(&self) -> &str {
            "probe"
        }

        async fn fetch_batch(&self) -> std::result::Result<Vec<SessionState>, PlatformError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_every.is_some_and(|n| call % n == 0) {
                return Err(PlatformError::Transport("scripted failure".to_string()));
            }
            Ok(vec![SessionState::new(call as u64)])
        }
    }

    fn scheduler(feed: Arc<ProbeFeed>, poll_ms: u64) -> (PollingScheduler, Arc<SessionRegistry>) {
        let registry = Arc::new(SessionRegistry::default());
        let scheduler = PollingScheduler::new(
            feed,
            registry.clone(),
            Arc::new(MemorySnapshotStore::new()),
            SchedulerConfig {
                poll_interval: Duration::from_millis(poll_ms),
                save_interval: Duration::from_secs(30),
            },
            Arc::new(SystemClock),
        );
        (scheduler, registry)
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn cycles_never_overlap() {
        let feed = Arc::new(ProbeFeed::slow(Duration::from_millis(30)));
        let (scheduler, _) = scheduler(feed.clone(), 1);

        assert!(scheduler.start());
        wait_for(|| feed.calls() >= 4).await;
        scheduler.cancel();

        assert_eq!(feed.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_and_cancel_are_idempotent() {
        let feed = Arc::new(ProbeFeed::slow(Duration::from_millis(5)));
        let (scheduler, _) = scheduler(feed, 10);

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(!scheduler.cancel());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.state().is_active());

        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());
        assert_eq!(scheduler.state(), SchedulerState::Cancelled);
    }

    #[tokio::test]
    async fn cancel_lets_in_flight_cycle_finish_but_stops_the_loop() {
        let feed = Arc::new(ProbeFeed::slow(Duration::from_millis(50)));
        let (scheduler, registry) = scheduler(feed.clone(), 1);
        let mut events = scheduler.subscribe();

        scheduler.start();
        wait_for(|| feed.in_flight.load(Ordering::SeqCst) == 1).await;
        scheduler.cancel();

        // the running fetch still completes and is applied
        let event = events.recv().await.unwrap();
        assert!(matches!(event, CycleEvent::Succeeded(ref report) if report.added == vec![1]));
        assert!(registry.contains(1));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(feed.calls(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Cancelled);
    }

    #[tokio::test]
    async fn restart_waits_for_previous_cycle() {
        let feed = Arc::new(ProbeFeed::slow(Duration::from_millis(60)));
        let (scheduler, _) = scheduler(feed.clone(), 1);

        scheduler.start();
        wait_for(|| feed.in_flight.load(Ordering::SeqCst) == 1).await;
        scheduler.cancel();
        assert!(scheduler.start());

        wait_for(|| feed.calls() >= 3).await;
        scheduler.cancel();
        assert_eq!(feed.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_keep_the_registry_and_the_loop() {
        let feed = Arc::new(ProbeFeed {
            fail_every: Some(2),
            ..Default::default()
        });
        let (scheduler, registry) = scheduler(feed.clone(), 1);
        let mut events = scheduler.subscribe();

        scheduler.start();
        let first = events.recv().await.unwrap();
        assert!(matches!(first, CycleEvent::Succeeded(_)));
        let second = events.recv().await.unwrap();
        assert!(matches!(second, CycleEvent::Failed(ref msg) if msg.contains("scripted failure")));

        // the failed cycle removed nothing
        assert!(registry.contains(1));

        let third = events.recv().await.unwrap();
        assert!(
            matches!(third, CycleEvent::Succeeded(ref report) if report.added == vec![3] && report.removed == vec![1])
        );
        scheduler.cancel();
    }

    /// Feed whose every fetch moves a manual clock forward by one second.
    /// After 35 fetches it only fails, so the clock stops at 35 s.
    struct TickingFeed {
        clock: ManualClock,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SessionFeed for TickingFeed {
        fn platform_name(&self) -> &str {
            "ticking"
        }

        async fn fetch_batch(&self) -> std::result::Result<Vec<SessionState>, PlatformError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call > 35 {
                return Err(PlatformError::Transport("feed closed".to_string()));
            }
            self.clock.advance(Duration::from_secs(1));
            Ok(vec![SessionState::new(1)])
        }
    }

    #[tokio::test]
    async fn saves_once_per_window() {
        let clock = ManualClock::new();
        let feed = Arc::new(TickingFeed {
            clock: clock.clone(),
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MemorySnapshotStore::new());
        let scheduler = PollingScheduler::new(
            feed.clone(),
            Arc::new(SessionRegistry::default()),
            store.clone(),
            SchedulerConfig {
                poll_interval: Duration::from_millis(1),
                save_interval: Duration::from_secs(30),
            },
            Arc::new(clock),
        );
        scheduler.start();
        wait_for(|| feed.calls.load(Ordering::SeqCst) > 36).await;
        scheduler.cancel();

        assert_eq!(store.save_count(), 1);
        assert_eq!(store.last_saved().unwrap().len(), 1);
    }
}
