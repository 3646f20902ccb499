//! Per-adapter cached state.
//!
//! Adapters are called both from the polling task and from foreground
//! callers, so every cached field sits behind one lock. The lock is never
//! held across network I/O.

use parking_lot::Mutex;

use crate::media::{Resolution, StreamSource};
use crate::session::OnlineState;

#[derive(Debug, Default)]
struct CacheInner {
    online: bool,
    online_state: OnlineState,
    stream_sources: Vec<StreamSource>,
    resolution: Option<Resolution>,
}

#[derive(Debug, Default)]
pub struct AdapterCache {
    inner: Mutex<CacheInner>,
}

impl AdapterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn online(&self) -> bool {
        self.inner.lock().online
    }

    pub fn set_online(&self, online: bool) {
        self.inner.lock().online = online;
    }

    pub fn online_state(&self) -> OnlineState {
        self.inner.lock().online_state
    }

    pub fn set_online_state(&self, state: OnlineState) {
        self.inner.lock().online_state = state;
    }

    pub fn stream_sources(&self) -> Vec<StreamSource> {
        self.inner.lock().stream_sources.clone()
    }

    /// Swaps in a freshly parsed source list as a whole.
    pub fn replace_stream_sources(&self, sources: Vec<StreamSource>) {
        self.inner.lock().stream_sources = sources;
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.inner.lock().resolution
    }

    pub fn set_resolution(&self, resolution: Resolution) {
        self.inner.lock().resolution = Some(resolution);
    }

    /// Forgets the resolution memo. Online state is kept.
    pub fn invalidate_resolution(&self) {
        self.inner.lock().resolution = None;
    }
}
