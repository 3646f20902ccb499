pub mod raw;
pub mod state;

pub use raw::{RawModelInfo, RawSession, RawUserInfo};
pub use state::{DEFAULT_TOPIC, OnlineState, SessionState, Uid, decode_topic};
