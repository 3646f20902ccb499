pub mod debounce;
pub mod service;

pub use debounce::{Clock, Debouncer, ManualClock, SystemClock};
pub use service::{CycleEvent, PollingScheduler, SchedulerConfig, SchedulerState};
