use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tracing::{debug, warn};

use super::cache::AdapterCache;
use super::default::DEFAULT_UA;
use super::error::PlatformError;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::media::{ResolveError, Resolution, StreamResolver, StreamSource};
use crate::session::{OnlineState, SessionState};

/// Header marking a request as issued by page scripts.
pub const X_REQUESTED_WITH: &str = "X-Requested-With";

/// Request builder shared by the adapters of one platform.
///
/// Holds the platform default headers and the injected transport. Every
/// request built here carries those headers; per-request headers can still
/// override them.
#[derive(Clone)]
pub struct PlatformClient {
    // name of the platform, e.g. "Streamate"
    pub platform_name: String,
    transport: Arc<dyn HttpTransport>,
    platform_headers: HeaderMap,
}

impl PlatformClient {
    pub fn new<S: Into<String>>(platform_name: S, transport: Arc<dyn HttpTransport>) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(DEFAULT_UA),
        );
        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en"),
        );

        Self {
            platform_name: platform_name.into(),
            transport,
            platform_headers: default_headers,
        }
    }

    #[inline]
    pub fn set_referer_static(&mut self, referer: &'static str) {
        self.add_header_owned(reqwest::header::REFERER, HeaderValue::from_static(referer));
    }

    /// Marks requests as XMLHttpRequest, as most ajax endpoints expect.
    pub fn set_xhr(&mut self) {
        self.add_header_str(X_REQUESTED_WITH, "XMLHttpRequest");
    }

    pub fn add_header_str<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) {
        match HeaderName::from_str(key.as_ref()) {
            Ok(name) => match HeaderValue::from_str(value.as_ref()) {
                Ok(value) => {
                    self.platform_headers.insert(name, value);
                }
                Err(e) => {
                    debug!(error = %e, "Invalid header value; skipping");
                }
            },
            Err(e) => {
                debug!(error = %e, "Invalid header name; skipping");
            }
        }
    }

    pub fn add_header_owned<K: Into<HeaderName>, V: Into<HeaderValue>>(
        &mut self,
        key: K,
        value: V,
    ) {
        self.platform_headers.insert(key.into(), value.into());
    }

    pub fn add_header_typed<K: Into<HeaderName>, V: AsRef<str>>(&mut self, key: K, value: V) {
        match HeaderValue::from_str(value.as_ref()) {
            Ok(value) => {
                self.platform_headers.insert(key.into(), value);
            }
            Err(e) => {
                debug!(error = %e, "Invalid header value; skipping");
            }
        }
    }

    pub fn get(&self, url: &str) -> HttpRequest {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> HttpRequest {
        self.request(Method::POST, url)
    }

    pub fn request(&self, method: Method, url: &str) -> HttpRequest {
        HttpRequest::new(method, url).headers(self.platform_headers.clone())
    }

    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PlatformError> {
        self.transport.execute(request).await
    }
}

/// Site-level capability: one call returns every session the platform
/// currently lists.
#[async_trait]
pub trait SessionFeed: Send + Sync {
    fn platform_name(&self) -> &str;

    async fn fetch_batch(&self) -> Result<Vec<SessionState>, PlatformError>;
}

/// Per-broadcaster capability, one implementation per platform.
///
/// Every `fail_fast` query answers from cache without network access so that
/// live views never block; the other variants may block and fail.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn get_client(&self) -> &PlatformClient;

    fn cache(&self) -> &AdapterCache;

    /// Broadcaster name on the platform.
    fn name(&self) -> &str;

    /// Queries the platform when `ignore_cache` is set, otherwise answers from
    /// the last known value.
    async fn is_online(&self, ignore_cache: bool) -> Result<bool, PlatformError>;

    async fn get_stream_sources(&self) -> Result<Vec<StreamSource>, PlatformError>;

    async fn follow(&self, enable: bool) -> Result<bool, PlatformError>;

    async fn unfollow(&self) -> Result<bool, PlatformError> {
        self.follow(false).await
    }

    fn set_online_state(&self, state: OnlineState) {
        self.cache().set_online_state(state);
    }

    fn get_online_state(&self, fail_fast: bool) -> OnlineState {
        let state = self.cache().online_state();
        if fail_fast || state.is_known() {
            state
        } else {
            OnlineState::from_online(self.cache().online())
        }
    }

    /// Clears the resolution memo only.
    fn invalidate_cache_entries(&self) {
        self.cache().invalidate_resolution();
    }

    /// Blocking resolution lookup that reports why it failed.
    ///
    /// An empty source list is [`PlatformError::NoStreamsFound`]; a valid list
    /// whose best source has no dimensions yields [`Resolution::UNKNOWN`]
    /// without being cached.
    async fn resolve_stream_resolution(&self) -> Result<Resolution, PlatformError> {
        if let Some(resolution) = self.cache().resolution() {
            return Ok(resolution);
        }

        let sources = self.get_stream_sources().await?;
        match StreamResolver::resolve(&sources) {
            Ok(resolution) => {
                self.cache().set_resolution(resolution);
                Ok(resolution)
            }
            Err(ResolveError::NoSources) => Err(PlatformError::NoStreamsFound),
            Err(ResolveError::UnknownResolution) => {
                debug!(name = %self.name(), "Best stream source has no dimensions");
                Ok(Resolution::UNKNOWN)
            }
        }
    }

    /// Cached resolution, or [`Resolution::UNKNOWN`] when it cannot be
    /// determined. Never fails.
    ///
    /// A broadcaster last seen offline is answered without a lookup.
    async fn get_stream_resolution(&self, fail_fast: bool) -> Resolution {
        if let Some(resolution) = self.cache().resolution() {
            return resolution;
        }
        if fail_fast || !self.cache().online() {
            return Resolution::UNKNOWN;
        }

        match self.resolve_stream_resolution().await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(
                    name = %self.name(),
                    error = %e,
                    "Couldn't determine stream resolution"
                );
                Resolution::UNKNOWN
            }
        }
    }
}
