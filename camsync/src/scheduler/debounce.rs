//! Time-window debouncing with an injectable clock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Lets an action through at most once per `interval`.
///
/// The first window opens at construction, so nothing fires until one full
/// interval has elapsed.
pub struct Debouncer {
    interval: Duration,
    clock: Arc<dyn Clock>,
    last_fired: Mutex<Instant>,
}

impl Debouncer {
    pub fn new(interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let last_fired = Mutex::new(clock.now());
        Self {
            interval,
            clock,
            last_fired,
        }
    }

    /// Returns `true`, and starts a new window, when the current window has
    /// elapsed.
    pub fn ready(&self) -> bool {
        let now = self.clock.now();
        let mut last_fired = self.last_fired.lock();
        if now.saturating_duration_since(*last_fired) >= self.interval {
            *last_fired = now;
            true
        } else {
            false
        }
    }

    /// Starts a new window without firing, e.g. after a forced save.
    pub fn reset(&self) {
        *self.last_fired.lock() = self.clock.now();
    }
}
