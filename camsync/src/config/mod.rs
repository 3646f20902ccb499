//! Runtime configuration.
//!
//! Values come from `CAMSYNC_*` environment variables (after `.env` has been
//! loaded by the binary) on top of [`SyncConfig::default`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use camsync_platforms::extractor::PlatformKind;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Default delay between the end of one poll cycle and the start of the next.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default minimum spacing of snapshot saves.
const DEFAULT_SAVE_INTERVAL_MS: u64 = 30_000;

/// Default HTTP request timeout.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Remove a session on the first poll it is missing from.
const DEFAULT_MISSING_CYCLES_BEFORE_REMOVAL: u32 = 1;

/// Synchronizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Platform whose session feed is polled.
    pub platform: PlatformKind,
    /// Endpoint of the session feed.
    pub feed_url: Option<String>,
    /// Delay between cycle completions, in milliseconds.
    pub poll_interval_ms: u64,
    /// Minimum spacing of snapshot saves, in milliseconds.
    pub save_interval_ms: u64,
    /// Consecutive polls a session may be missing from before it is removed.
    pub missing_cycles_before_removal: u32,
    pub request_timeout_secs: u64,
    /// Directory holding `sessions.json`.
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Log filter directive applied on top of `RUST_LOG`, e.g. "camsync=debug".
    pub log_filter: Option<String>,
    pub session_key: Option<String>,
    pub user_id: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            platform: PlatformKind::MyFreeCams,
            feed_url: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            save_interval_ms: DEFAULT_SAVE_INTERVAL_MS,
            missing_cycles_before_removal: DEFAULT_MISSING_CYCLES_BEFORE_REMOVAL,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_dir: PathBuf::from("data"),
            log_dir: PathBuf::from("logs"),
            log_filter: None,
            session_key: None,
            user_id: None,
        }
    }
}

impl SyncConfig {
    /// Load config from the process environment, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `CAMSYNC_PLATFORM` (e.g. "myfreecams")
    /// - `CAMSYNC_FEED_URL`
    /// - `CAMSYNC_POLL_INTERVAL_MS`, `CAMSYNC_SAVE_INTERVAL_MS`
    /// - `CAMSYNC_MISSING_CYCLES`
    /// - `CAMSYNC_REQUEST_TIMEOUT_SECS`
    /// - `CAMSYNC_DATA_DIR`, `CAMSYNC_LOG_DIR`, `CAMSYNC_LOG_FILTER`
    /// - `CAMSYNC_SESSION_KEY`, `CAMSYNC_USER_ID`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SyncConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(platform) = var("CAMSYNC_PLATFORM") {
            config.platform = PlatformKind::from_str(&platform)
                .map_err(|_| Error::config(format!("unknown platform `{platform}`")))?;
        }
        if let Some(feed_url) = var("CAMSYNC_FEED_URL") {
            config.feed_url = Some(feed_url);
        }
        if let Some(v) = var("CAMSYNC_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_number("CAMSYNC_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = var("CAMSYNC_SAVE_INTERVAL_MS") {
            config.save_interval_ms = parse_number("CAMSYNC_SAVE_INTERVAL_MS", &v)?;
        }
        if let Some(v) = var("CAMSYNC_MISSING_CYCLES") {
            config.missing_cycles_before_removal = parse_number("CAMSYNC_MISSING_CYCLES", &v)?;
        }
        if let Some(v) = var("CAMSYNC_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_number("CAMSYNC_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(dir) = var("CAMSYNC_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("CAMSYNC_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        config.log_filter = var("CAMSYNC_LOG_FILTER");
        config.session_key = var("CAMSYNC_SESSION_KEY");
        if let Some(v) = var("CAMSYNC_USER_ID") {
            config.user_id = Some(parse_number("CAMSYNC_USER_ID", &v)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::config("poll interval must be greater than zero"));
        }
        if self.save_interval_ms == 0 {
            return Err(Error::config("save interval must be greater than zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::config("request timeout must be greater than zero"));
        }
        if self.missing_cycles_before_removal == 0 {
            return Err(Error::config(
                "missing cycles before removal must be at least 1",
            ));
        }
        if let Some(feed_url) = &self.feed_url {
            let url = Url::parse(feed_url)
                .map_err(|e| Error::config(format!("invalid feed url `{feed_url}`: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::config(format!(
                    "feed url must be http(s), got `{}`",
                    url.scheme()
                )));
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Feed endpoint, required by the binary.
    pub fn require_feed_url(&self) -> Result<&str> {
        self.feed_url
            .as_deref()
            .ok_or_else(|| Error::config("CAMSYNC_FEED_URL is not set"))
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| Error::config(format!("{key}=`{value}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.save_interval(), Duration::from_secs(30));
        assert_eq!(config.missing_cycles_before_removal, 1);
        assert!(config.require_feed_url().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("CAMSYNC_PLATFORM", "MyFreeCams"),
            ("CAMSYNC_FEED_URL", "https://feed.test/sessions"),
            ("CAMSYNC_POLL_INTERVAL_MS", "250"),
            ("CAMSYNC_MISSING_CYCLES", "3"),
            ("CAMSYNC_DATA_DIR", "/var/lib/camsync"),
            ("CAMSYNC_USER_ID", "42"),
            ("CAMSYNC_SESSION_KEY", "  "),
            ("CAMSYNC_LOG_FILTER", "camsync=debug"),
        ]))
        .unwrap();
        assert_eq!(config.platform, PlatformKind::MyFreeCams);
        assert_eq!(config.require_feed_url().unwrap(), "https://feed.test/sessions");
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.missing_cycles_before_removal, 3);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/camsync"));
        assert_eq!(config.user_id, Some(42));
        assert_eq!(config.session_key, None);
        assert_eq!(config.log_filter.as_deref(), Some("camsync=debug"));
    }

    #[test]
    fn rejects_bad_values() {
        for vars in [
            [("CAMSYNC_POLL_INTERVAL_MS", "0")],
            [("CAMSYNC_SAVE_INTERVAL_MS", "soon")],
            [("CAMSYNC_FEED_URL", "not a url")],
            [("CAMSYNC_FEED_URL", "ftp://feed.test")],
            [("CAMSYNC_PLATFORM", "nowhere")],
            [("CAMSYNC_MISSING_CYCLES", "0")],
        ] {
            let err = SyncConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, Error::Configuration(_)), "{vars:?}: {err}");
        }
    }
}
