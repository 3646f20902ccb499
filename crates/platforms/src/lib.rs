//! Platform adapters for webcam broadcast sessions.
//!
//! The crate normalizes heterogeneous platform payloads into a small set of
//! types ([`session::SessionState`], [`media::StreamSource`]) and exposes a
//! uniform adapter contract ([`extractor::PlatformAdapter`],
//! [`extractor::SessionFeed`]) over an injected HTTP transport.

pub mod extractor;
pub mod media;
pub mod session;

pub use extractor::error::{ErrorKind, PlatformError};
pub use media::{Resolution, StreamResolver, StreamSource};
pub use session::{OnlineState, SessionState, Uid};
