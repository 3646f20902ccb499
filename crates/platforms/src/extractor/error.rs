use thiserror::Error;

/// Coarse classification used by callers to decide whether to retry,
/// swallow or surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection or timeout failure.
    Transport,
    /// The platform answered with a non-success status.
    Protocol,
    /// The payload did not have the expected shape.
    Parse,
    /// Credentials could not be obtained.
    Auth,
    /// The session advertises no playable stream.
    NoStreams,
    /// The selected platform lacks the requested capability.
    Unsupported,
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("http status {status}: {message}")]
    Protocol { status: u16, message: String },
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("no streams found")]
    NoStreamsFound,
    #[error("platform not supported: {0}")]
    PlatformNotSupported(String),
}

impl PlatformError {
    pub fn protocol(status: u16, message: impl Into<String>) -> Self {
        Self::Protocol {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::HttpError(_) => ErrorKind::Transport,
            Self::Protocol { .. } => ErrorKind::Protocol,
            Self::JsonError(_) | Self::InvalidPayload(_) => ErrorKind::Parse,
            Self::NoStreamsFound => ErrorKind::NoStreams,
            Self::InvalidUrl(_) | Self::PlatformNotSupported(_) => ErrorKind::Unsupported,
            Self::Auth(_) => ErrorKind::Auth,
        }
    }

    /// Status code of a protocol error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Protocol { status, .. } => Some(*status),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
