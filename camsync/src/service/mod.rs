//! Lifecycle facade used by consumers of the registry.

use std::sync::Arc;

use camsync_platforms::SessionState;
use camsync_platforms::extractor::SessionFeed;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::Result;
use crate::config::SyncConfig;
use crate::persistence::SnapshotStore;
use crate::registry::SessionRegistry;
use crate::scheduler::{Clock, CycleEvent, PollingScheduler, SchedulerConfig, SchedulerState, SystemClock};

pub struct SyncService {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn SnapshotStore>,
    scheduler: PollingScheduler,
}

impl SyncService {
    pub fn new(config: &SyncConfig, feed: Arc<dyn SessionFeed>, store: Arc<dyn SnapshotStore>) -> Self {
        Self::with_clock(config, feed, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &SyncConfig,
        feed: Arc<dyn SessionFeed>,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.missing_cycles_before_removal));
        let scheduler = PollingScheduler::new(
            feed,
            registry.clone(),
            store.clone(),
            SchedulerConfig {
                poll_interval: config.poll_interval(),
                save_interval: config.save_interval(),
            },
            clock,
        );
        Self {
            registry,
            store,
            scheduler,
        }
    }

    /// Restores the last snapshot into the registry.
    ///
    /// Failures are logged and leave the registry as it was. Returns the
    /// number of sessions restored.
    pub async fn load(&self) -> usize {
        match self.store.load().await {
            Ok(records) => {
                let restored = self.registry.restore(records);
                info!(restored, "Session snapshot restored");
                restored
            }
            Err(e) => {
                warn!(error = %e, "Failed to load session snapshot");
                0
            }
        }
    }

    /// The consumer became visible: start polling.
    pub fn selected(&self) -> bool {
        self.scheduler.start()
    }

    /// The consumer went away: stop polling and save right away.
    pub async fn deselected(&self) -> bool {
        let cancelled = self.scheduler.cancel();
        if let Err(e) = self.save_now().await {
            warn!(error = %e, "Failed to save session snapshot");
        }
        cancelled
    }

    /// Saves the current registry contents regardless of the save interval.
    /// The next periodic save waits a full interval from here.
    pub async fn save_now(&self) -> Result<()> {
        let snapshot = self.registry.snapshot();
        self.store.save(&snapshot).await?;
        self.scheduler.restart_save_window();
        Ok(())
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn snapshot(&self) -> Vec<SessionState> {
        self.registry.snapshot()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.scheduler.subscribe()
    }
}
