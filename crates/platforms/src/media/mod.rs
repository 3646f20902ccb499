pub mod resolver;
pub mod stream_source;

pub use resolver::{ResolveError, Resolution, StreamResolver};
pub use stream_source::StreamSource;
