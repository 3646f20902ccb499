use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, trace};

use super::models::{Encoding, FollowResponse, LiveManifest};
use crate::extractor::auth::AuthProvider;
use crate::extractor::cache::AdapterCache;
use crate::extractor::error::PlatformError;
use crate::extractor::platform_extractor::{PlatformAdapter, PlatformClient};
use crate::extractor::transport::HttpTransport;
use crate::media::StreamSource;

/// Where the adapter sends its requests.
#[derive(Debug, Clone)]
pub struct StreamateEndpoints {
    pub base_url: String,
    /// Live manifest URL; `{name}` is replaced by the broadcaster name.
    pub live_url_template: String,
}

impl Default for StreamateEndpoints {
    fn default() -> Self {
        Self {
            base_url: Streamate::BASE_URL.to_string(),
            live_url_template: Streamate::LIVE_URL_TEMPLATE.to_string(),
        }
    }
}

pub struct Streamate {
    client: PlatformClient,
    cache: AdapterCache,
    auth: Arc<dyn AuthProvider>,
    endpoints: StreamateEndpoints,
    name: String,
    performer_id: Option<u64>,
}

impl Streamate {
    const BASE_URL: &str = "https://www.streamate.com";
    const LIVE_URL_TEMPLATE: &str =
        "https://sea1c-ls.naiadsystems.com/sea1c-edge-ls/80/live/s:{name}.json";
    const DOMAIN: &str = "streamate.com";

    pub fn new(
        name: impl Into<String>,
        performer_id: Option<u64>,
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self::with_endpoints(
            name,
            performer_id,
            transport,
            auth,
            StreamateEndpoints::default(),
        )
    }

    pub fn with_endpoints(
        name: impl Into<String>,
        performer_id: Option<u64>,
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        endpoints: StreamateEndpoints,
    ) -> Self {
        let name = name.into();
        let mut client = PlatformClient::new("Streamate", transport);
        client.add_header_typed(
            reqwest::header::REFERER,
            format!("{}/{}", endpoints.base_url, name),
        );
        client.set_xhr();

        Self {
            client,
            cache: AdapterCache::new(),
            auth,
            endpoints,
            name,
            performer_id,
        }
    }

    pub fn performer_id(&self) -> Option<u64> {
        self.performer_id
    }

    fn live_url(&self) -> String {
        self.endpoints
            .live_url_template
            .replace("{name}", &urlencoding::encode(&self.name))
    }

    fn encoding_to_source(location: &str, dims: &Encoding) -> StreamSource {
        StreamSource::from_kbps(
            location,
            dims.video_width.unwrap_or(0),
            dims.video_height.unwrap_or(0),
            dims.video_kbps.unwrap_or(0),
            dims.audio_kbps.unwrap_or(0),
        )
    }

    /// Maps a manifest to sources. The origin stream is always present and
    /// takes its dimensions from the websocket variant when one is listed.
    fn sources_from_manifest(manifest: LiveManifest) -> Result<Vec<StreamSource>, PlatformError> {
        let hls = manifest.formats.hls;
        if hls.origin.location.is_empty() {
            return Err(PlatformError::InvalidPayload(
                "origin stream has no location".to_string(),
            ));
        }

        let mut sources = Vec::with_capacity(hls.encodings.len() + 1);
        for encoding in &hls.encodings {
            if encoding.location.is_empty() {
                debug!("Skipping encoding without location");
                continue;
            }
            sources.push(Self::encoding_to_source(&encoding.location, encoding));
        }

        let origin_dims = manifest
            .formats
            .ws
            .and_then(|ws| ws.origin)
            .unwrap_or_else(|| hls.origin.clone());
        sources.push(Self::encoding_to_source(&hls.origin.location, &origin_dims));
        Ok(sources)
    }
}

#[async_trait]
impl PlatformAdapter for Streamate {
    fn get_client(&self) -> &PlatformClient {
        &self.client
    }

    fn cache(&self) -> &AdapterCache {
        &self.cache
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn is_online(&self, ignore_cache: bool) -> Result<bool, PlatformError> {
        if !ignore_cache {
            return Ok(self.cache.online());
        }

        let response = self.client.send(self.client.get(&self.live_url())).await?;
        let online = response.is_success();
        trace!(name = %self.name, status = %response.status, online, "Live manifest probed");
        self.cache.set_online(online);
        Ok(online)
    }

    async fn get_stream_sources(&self) -> Result<Vec<StreamSource>, PlatformError> {
        let response = self
            .client
            .send(self.client.get(&self.live_url()))
            .await?
            .error_for_status()?;

        let manifest: LiveManifest = response.json()?;
        let sources = Self::sources_from_manifest(manifest)?;
        debug!(name = %self.name, count = sources.len(), "Stream sources parsed");
        self.cache.replace_stream_sources(sources.clone());
        Ok(sources)
    }

    async fn follow(&self, enable: bool) -> Result<bool, PlatformError> {
        let performer_id = self.performer_id.ok_or_else(|| {
            PlatformError::InvalidPayload(format!("no performer id known for {}", self.name))
        })?;
        let session = self.auth.session().await?;

        let url = format!("{}/ajax/fav-notify.php", self.endpoints.base_url);
        let user_id = session.user_id.to_string();
        let pid = performer_id.to_string();
        let mut request = self
            .client
            .post(&url)
            .query("userid", user_id.as_str())
            .query("sakey", session.session_key.as_str())
            .query("pid", pid.as_str())
            .query("fav", enable.to_string())
            .query("domain", Self::DOMAIN)
            .json_body(&json!({
                "sakey": session.session_key,
                "userid": session.user_id,
                "pid": performer_id,
                "domain": Self::DOMAIN,
                "fav": enable,
            }))?;
        request.headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json, */*"),
        );

        let response = self.client.send(request).await?.error_for_status()?;
        let answer: FollowResponse = response.json()?;
        debug!(name = %self.name, enable, success = answer.success, "Follow toggled");
        Ok(answer.success)
    }
}
