use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

/// Stable broadcaster identity, the registry primary key.
pub type Uid = u64;

/// Placeholder stored when a session carries no topic.
pub const DEFAULT_TOPIC: &str = "n/a";

/// Coarse live state derived from a platform status code.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnlineState {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl OnlineState {
    /// Maps the numeric video state of the session-array payload.
    pub fn from_video_state(code: i64) -> Self {
        match code {
            // public, away, private, group show, club show
            0 | 2 | 12 | 13 | 14 => OnlineState::Online,
            // cam off, offline
            90 | 127 => OnlineState::Offline,
            _ => OnlineState::Unknown,
        }
    }

    pub fn from_online(online: bool) -> Self {
        if online {
            OnlineState::Online
        } else {
            OnlineState::Offline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OnlineState::Unknown => "UNKNOWN",
            OnlineState::Online => "ONLINE",
            OnlineState::Offline => "OFFLINE",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, OnlineState::Unknown)
    }
}

impl fmt::Display for OnlineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one broadcaster as last observed.
///
/// `uid` is fixed at construction. Every other field may be replaced through
/// [`SessionState::update`], which only writes values that were observed and
/// differ from the current ones.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    uid: Uid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "state")]
    pub online_state: OnlineState,
    #[serde(default)]
    pub cam_score: Option<f64>,
    #[serde(default)]
    pub is_new: Option<bool>,
    #[serde(default)]
    pub ethnicity: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub continent: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub blurp: Option<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Set when the payload carried a status code, even one that maps to
    /// [`OnlineState::Unknown`].
    #[serde(skip)]
    state_observed: bool,
}

impl PartialEq for SessionState {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
            && self.name == other.name
            && self.online_state == other.online_state
            && self.cam_score == other.cam_score
            && self.is_new == other.is_new
            && self.ethnicity == other.ethnicity
            && self.country == other.country
            && self.continent == other.continent
            && self.occupation == other.occupation
            && self.tags == other.tags
            && self.blurp == other.blurp
            && self.topic == other.topic
    }
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

impl SessionState {
    pub fn new(uid: Uid) -> Self {
        Self {
            uid,
            name: None,
            online_state: OnlineState::Unknown,
            cam_score: None,
            is_new: None,
            ethnicity: None,
            country: None,
            continent: None,
            occupation: None,
            tags: BTreeSet::new(),
            blurp: None,
            topic: default_topic(),
            state_observed: false,
        }
    }

    #[inline]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_online_state(mut self, state: OnlineState) -> Self {
        self.observe_online_state(state);
        self
    }

    /// Records a state reported by the platform. Unlike assigning
    /// `online_state`, an observed [`OnlineState::Unknown`] overwrites the
    /// current state on [`SessionState::update`].
    pub fn observe_online_state(&mut self, state: OnlineState) {
        self.online_state = state;
        self.state_observed = true;
    }

    /// Whether the online state was reported rather than left unset.
    pub fn online_state_observed(&self) -> bool {
        self.state_observed || self.online_state.is_known()
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Tags as a single comma separated line, e.g. `"a, b, c"`.
    pub fn tags_display(&self) -> String {
        self.tags
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Copies observed values over this state and returns how many fields
    /// actually changed.
    ///
    /// Absent observations (`None`, an unreported online state, an empty tag
    /// set) keep the current value. A state for a different uid is ignored.
    pub fn update(&mut self, observed: &SessionState) -> usize {
        if observed.uid != self.uid {
            warn!(
                uid = self.uid,
                observed = observed.uid,
                "Ignoring update for a different session"
            );
            return 0;
        }

        let mut changed = 0;
        changed += usize::from(replace_if_changed(&mut self.name, &observed.name));
        if observed.online_state_observed() && observed.online_state != self.online_state {
            self.online_state = observed.online_state;
            changed += 1;
        }
        changed += usize::from(replace_if_changed(&mut self.cam_score, &observed.cam_score));
        changed += usize::from(replace_if_changed(&mut self.is_new, &observed.is_new));
        changed += usize::from(replace_if_changed(&mut self.ethnicity, &observed.ethnicity));
        changed += usize::from(replace_if_changed(&mut self.country, &observed.country));
        changed += usize::from(replace_if_changed(&mut self.continent, &observed.continent));
        changed += usize::from(replace_if_changed(&mut self.occupation, &observed.occupation));
        if !observed.tags.is_empty() && observed.tags != self.tags {
            self.tags = observed.tags.clone();
            changed += 1;
        }
        changed += usize::from(replace_if_changed(&mut self.blurp, &observed.blurp));
        if observed.topic != self.topic {
            self.topic = observed.topic.clone();
            changed += 1;
        }
        changed
    }
}

fn replace_if_changed<T: PartialEq + Clone>(slot: &mut Option<T>, observed: &Option<T>) -> bool {
    match observed {
        Some(value) if slot.as_ref() != Some(value) => {
            *slot = Some(value.clone());
            true
        }
        _ => false,
    }
}

/// Percent-decodes a raw topic line.
///
/// `+` is read as a space, matching form encoding. Input that does not decode
/// to UTF-8 is kept verbatim.
pub fn decode_topic(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            warn!(topic = %raw, error = %e, "Couldn't url decode topic");
            raw.to_string()
        }
    }
}
