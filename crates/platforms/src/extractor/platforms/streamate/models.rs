use serde::Deserialize;

use crate::extractor::utils::{lenient_u32, lenient_u64};

/// Live manifest served by the edge for `s:{name}.json`.
#[derive(Debug, Deserialize)]
pub struct LiveManifest {
    pub formats: Formats,
}

#[derive(Debug, Deserialize)]
pub struct Formats {
    #[serde(rename = "mp4-hls")]
    pub hls: HlsFormat,
    #[serde(rename = "mp4-ws", default)]
    pub ws: Option<WsFormat>,
}

#[derive(Debug, Deserialize)]
pub struct HlsFormat {
    #[serde(default)]
    pub encodings: Vec<Encoding>,
    pub origin: Encoding,
}

#[derive(Debug, Deserialize)]
pub struct WsFormat {
    #[serde(default)]
    pub origin: Option<Encoding>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encoding {
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub video_width: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub video_height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub video_kbps: Option<u64>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub audio_kbps: Option<u64>,
}

/// Answer of the favourite toggle endpoint.
#[derive(Debug, Deserialize)]
pub struct FollowResponse {
    #[serde(default)]
    pub success: bool,
}
