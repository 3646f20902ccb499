use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One playable encoding of a broadcast.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamSource {
    // Playable url, either an HLS media playlist or a direct stream
    pub media_playlist_url: String,
    // Pixel dimensions, 0 when the platform does not report them
    pub width: u32,
    pub height: u32,
    // Bits per second estimate, 0 when unknown
    pub bandwidth: u64,
}

impl StreamSource {
    pub fn new(media_playlist_url: impl Into<String>, width: u32, height: u32, bandwidth: u64) -> Self {
        Self {
            media_playlist_url: media_playlist_url.into(),
            width,
            height,
            bandwidth,
        }
    }

    /// Builds a source from the kbps figures most platforms report.
    pub fn from_kbps(
        media_playlist_url: impl Into<String>,
        width: u32,
        height: u32,
        video_kbps: u64,
        audio_kbps: u64,
    ) -> Self {
        Self::new(
            media_playlist_url,
            width,
            height,
            video_kbps.saturating_add(audio_kbps).saturating_mul(1024),
        )
    }

    #[inline]
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    #[inline]
    pub fn has_resolution(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Ord for StreamSource {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bandwidth
            .cmp(&other.bandwidth)
            .then_with(|| self.pixels().cmp(&other.pixels()))
            .then_with(|| self.width.cmp(&other.width))
            .then_with(|| self.height.cmp(&other.height))
            .then_with(|| self.media_playlist_url.cmp(&other.media_playlist_url))
    }
}

impl PartialOrd for StreamSource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_resolution() {
            write!(
                f,
                "{}x{} @ {} bps ({})",
                self.width, self.height, self.bandwidth, self.media_playlist_url
            )
        } else {
            write!(f, "? @ {} bps ({})", self.bandwidth, self.media_playlist_url)
        }
    }
}
