//! Copilot credential lifecycle: device-flow login, token exchange, caching.

pub mod cache;
pub mod device_code;
pub mod error;
pub mod exchange;
pub mod login;
pub mod resolver;
pub mod transport;

pub use cache::{CachedServiceToken, FileTokenCache, TokenCache, TokenSource};
pub use device_code::{DeviceAuthorization, DeviceAuthorizer, DeviceCodePoll};
pub use error::{AuthError, ErrorKind};
pub use exchange::{derive_base_url, TokenExchanger};
pub use login::{login, LoginOptions};
pub use resolver::{CredentialResolver, ResolvedCredential};
pub use transport::{HttpReply, HttpTransport, ReqwestTransport};
