use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::extractor::error::PlatformError;
use crate::extractor::platform_extractor::{PlatformClient, SessionFeed};
use crate::extractor::transport::HttpTransport;
use crate::session::{RawSession, SessionState};

/// Site-wide session listing.
///
/// The listing is either a bare array of session objects or an object
/// carrying them under `sessions`.
pub struct MyFreeCams {
    client: PlatformClient,
    feed_url: String,
}

impl MyFreeCams {
    const BASE_URL: &str = "https://www.myfreecams.com";

    pub fn new(feed_url: &str, transport: Arc<dyn HttpTransport>) -> Result<Self, PlatformError> {
        let feed_url = Url::parse(feed_url)
            .map_err(|e| PlatformError::InvalidUrl(format!("{feed_url}: {e}")))?;

        let mut client = PlatformClient::new("MyFreeCams", transport);
        client.set_referer_static(Self::BASE_URL);
        client.set_xhr();
        Ok(Self {
            client,
            feed_url: feed_url.into(),
        })
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    pub(crate) fn parse_batch(payload: Value) -> Result<Vec<SessionState>, PlatformError> {
        let entries = match payload {
            Value::Array(entries) => entries,
            Value::Object(mut map) => match map.remove("sessions") {
                Some(Value::Array(entries)) => entries,
                _ => {
                    return Err(PlatformError::InvalidPayload(
                        "expected a `sessions` array".to_string(),
                    ));
                }
            },
            other => {
                return Err(PlatformError::InvalidPayload(format!(
                    "expected an array of sessions, got {}",
                    json_type(&other)
                )));
            }
        };

        let total = entries.len();
        let sessions: Vec<SessionState> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let raw = match serde_json::from_value::<RawSession>(entry) {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(index, error = %e, "Skipping malformed session entry");
                        return None;
                    }
                };
                let state = raw.into_state();
                if state.is_none() {
                    warn!(index, "Skipping session entry without uid");
                }
                state
            })
            .collect();

        debug!(total, accepted = sessions.len(), "Session batch parsed");
        Ok(sessions)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl SessionFeed for MyFreeCams {
    fn platform_name(&self) -> &str {
        &self.client.platform_name
    }

    async fn fetch_batch(&self) -> Result<Vec<SessionState>, PlatformError> {
        let response = self
            .client
            .send(self.client.get(&self.feed_url))
            .await?
            .error_for_status()?;
        let payload: Value = response.json()?;
        Self::parse_batch(payload)
    }
}
