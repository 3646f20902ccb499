//! Wire models of the session-array payload.
//!
//! The payload is loosely typed: numbers sometimes arrive as strings, nested
//! objects may be missing or `null`. Everything here is optional and only
//! [`RawSession::into_state`] decides what is usable.

use serde::Deserialize;

use super::state::{DEFAULT_TOPIC, OnlineState, SessionState, decode_topic};
use crate::extractor::utils::{lenient_f64, lenient_i64, lenient_u64};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSession {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub uid: Option<u64>,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub vs: Option<i64>,
    #[serde(default)]
    pub m: Option<RawModelInfo>,
    #[serde(default)]
    pub u: Option<RawUserInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawModelInfo {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub camscore: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub new_model: Option<i64>,
    #[serde(default)]
    pub continent: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUserInfo {
    #[serde(default)]
    pub ethnic: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub blurb: Option<String>,
}

impl RawSession {
    /// Normalizes the payload. Returns `None` when there is no uid to key on.
    pub fn into_state(self) -> Option<SessionState> {
        let uid = self.uid?;
        let m = self.m.unwrap_or_default();
        let u = self.u.unwrap_or_default();

        let mut state = SessionState::new(uid);
        state.name = self.nm.filter(|n| !n.is_empty());
        if let Some(vs) = self.vs {
            state.observe_online_state(OnlineState::from_video_state(vs));
        }
        state.cam_score = m.camscore;
        state.is_new = m.new_model.map(|flag| flag == 1);
        state.continent = m.continent;
        state.tags = m
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        state.topic = m
            .topic
            .as_deref()
            .map(decode_topic)
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        state.ethnicity = u.ethnic;
        state.country = u.country;
        state.occupation = u.occupation;
        state.blurp = u.blurb;
        Some(state)
    }
}
