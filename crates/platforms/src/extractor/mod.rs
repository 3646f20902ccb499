pub mod auth;
pub mod cache;
mod default;
pub mod error;
pub mod factory;
pub mod platform_extractor;
pub mod platforms;
pub mod transport;
pub(crate) mod utils;

pub use auth::{AuthProvider, AuthSession, CachedAuth, StaticAuth};
pub use cache::AdapterCache;
pub use default::{DEFAULT_TIMEOUT, default_client};
pub use error::{ErrorKind, PlatformError};
pub use factory::{PlatformFactory, PlatformKind};
pub use platform_extractor::{PlatformAdapter, PlatformClient, SessionFeed};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
