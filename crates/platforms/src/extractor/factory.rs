use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::auth::AuthProvider;
use super::error::PlatformError;
use super::platform_extractor::{PlatformAdapter, SessionFeed};
use super::platforms::{myfreecams::MyFreeCams, streamate::Streamate};
use super::transport::HttpTransport;

/// Platforms known to the synchronizer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    MyFreeCams,
    Streamate,
}

/// Builds feeds and adapters over one shared transport.
#[derive(Clone)]
pub struct PlatformFactory {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
}

impl PlatformFactory {
    pub fn new(transport: Arc<dyn HttpTransport>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { transport, auth }
    }

    /// Site-wide session feed. Only listing platforms have one.
    pub fn create_feed(
        &self,
        kind: PlatformKind,
        feed_url: &str,
    ) -> Result<Arc<dyn SessionFeed>, PlatformError> {
        match kind {
            PlatformKind::MyFreeCams => Ok(Arc::new(MyFreeCams::new(
                feed_url,
                self.transport.clone(),
            )?)),
            PlatformKind::Streamate => Err(PlatformError::PlatformNotSupported(format!(
                "{kind} has no session feed"
            ))),
        }
    }

    /// Per-broadcaster adapter.
    pub fn create_adapter(
        &self,
        kind: PlatformKind,
        name: &str,
        id: Option<u64>,
    ) -> Result<Arc<dyn PlatformAdapter>, PlatformError> {
        match kind {
            PlatformKind::Streamate => Ok(Arc::new(Streamate::new(
                name,
                id,
                self.transport.clone(),
                self.auth.clone(),
            ))),
            PlatformKind::MyFreeCams => Err(PlatformError::PlatformNotSupported(format!(
                "{kind} has no broadcaster adapter"
            ))),
        }
    }
}
