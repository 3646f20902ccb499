//! Quality ranking over the encodings a platform advertises.
//!
//! Sources are ranked by bandwidth first and resolution second; the best
//! source is the maximum under that ordering. An empty list and a list whose
//! best entry carries no dimensions are reported as different errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use super::StreamSource;

/// Pixel dimensions of a stream.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Sentinel for "could not be determined".
    pub const UNKNOWN: Resolution = Resolution {
        width: 0,
        height: 0,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl From<&StreamSource> for Resolution {
    fn from(src: &StreamSource) -> Self {
        Self::new(src.width, src.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The session advertises nothing playable.
    #[error("no stream sources")]
    NoSources,
    /// A best source exists but reports no dimensions.
    #[error("stream resolution unknown")]
    UnknownResolution,
}

/// Stateless selector over a list of [`StreamSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamResolver;

impl StreamResolver {
    /// Sorts ascending, worst first.
    pub fn sort(sources: &mut [StreamSource]) {
        sources.sort();
    }

    pub fn select_best(sources: &[StreamSource]) -> Result<&StreamSource, ResolveError> {
        let best = sources.iter().max().ok_or(ResolveError::NoSources)?;
        debug!(candidates = sources.len(), best = %best, "Selected best stream source");
        Ok(best)
    }

    pub fn resolve(sources: &[StreamSource]) -> Result<Resolution, ResolveError> {
        let best = Self::select_best(sources)?;
        if best.has_resolution() {
            Ok(Resolution::from(best))
        } else {
            Err(ResolveError::UnknownResolution)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(bandwidths: &[u64]) -> Vec<StreamSource> {
        bandwidths
            .iter()
            .enumerate()
            .map(|(i, bw)| StreamSource::new(format!("https://edge/{i}.m3u8"), 640, 360, *bw))
            .collect()
    }

    #[test]
    fn picks_highest_bandwidth() {
        let list = sources(&[500_000, 1_500_000, 900_000]);
        let best = StreamResolver::select_best(&list).unwrap();
        assert_eq!(best.bandwidth, 1_500_000);
    }

    #[test]
    fn sort_puts_best_last() {
        let mut list = sources(&[500_000, 1_500_000, 900_000]);
        StreamResolver::sort(&mut list);
        let order: Vec<u64> = list.iter().map(|s| s.bandwidth).collect();
        assert_eq!(order, vec![500_000, 900_000, 1_500_000]);
    }

    #[test]
    fn empty_list_is_no_sources() {
        assert_eq!(StreamResolver::select_best(&[]), Err(ResolveError::NoSources));
        assert_eq!(StreamResolver::resolve(&[]), Err(ResolveError::NoSources));
    }

    #[test]
    fn missing_dimensions_is_unknown_resolution() {
        let list = vec![
            StreamSource::new("a", 640, 360, 100),
            StreamSource::new("origin", 0, 0, 5_000_000),
        ];
        assert_eq!(
            StreamResolver::resolve(&list),
            Err(ResolveError::UnknownResolution)
        );
    }

    #[test]
    fn resolves_dimensions_of_best() {
        let list = vec![
            StreamSource::new("a", 640, 360, 100),
            StreamSource::new("b", 1920, 1080, 200),
        ];
        assert_eq!(StreamResolver::resolve(&list), Ok(Resolution::new(1920, 1080)));
        assert!(!Resolution::UNKNOWN.is_known());
    }
}
