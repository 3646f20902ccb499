//! Authentication collaborator.
//!
//! The login handshake itself lives outside this crate. Adapters only need a
//! session key and the numeric account id, obtained lazily right before an
//! authenticated request.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::PlatformError;

/// Credentials attached to authenticated platform calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub session_key: String,
    pub user_id: u64,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn session(&self) -> Result<AuthSession, PlatformError>;
}

/// Credentials known up front, e.g. from configuration.
#[derive(Debug, Clone)]
pub struct StaticAuth {
    session: Option<AuthSession>,
}

impl StaticAuth {
    pub fn new(session_key: impl Into<String>, user_id: u64) -> Self {
        Self {
            session: Some(AuthSession {
                session_key: session_key.into(),
                user_id,
            }),
        }
    }

    /// A provider that always reports missing credentials.
    pub fn anonymous() -> Self {
        Self { session: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn session(&self) -> Result<AuthSession, PlatformError> {
        self.session
            .clone()
            .ok_or_else(|| PlatformError::Auth("no credentials configured".to_string()))
    }
}

/// Obtains a session from the inner provider once and reuses it until
/// [`CachedAuth::invalidate`] is called.
pub struct CachedAuth<A> {
    inner: A,
    session: Mutex<Option<AuthSession>>,
}

impl<A: AuthProvider> CachedAuth<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            session: Mutex::new(None),
        }
    }

    pub fn invalidate(&self) {
        *self.session.lock() = None;
    }
}

#[async_trait]
impl<A: AuthProvider> AuthProvider for CachedAuth<A> {
    async fn session(&self) -> Result<AuthSession, PlatformError> {
        let cached = self.session.lock().clone();
        if let Some(session) = cached {
            return Ok(session);
        }
        let session = self.inner.session().await?;
        *self.session.lock() = Some(session.clone());
        Ok(session)
    }
}
