use std::sync::Arc;
use std::time::Duration;

use super::cache::{CachedServiceToken, FileTokenCache, TokenCache, TokenSource};
use super::error::AuthError;
use super::exchange::TokenExchanger;
use super::transport::{HttpTransport, ReqwestTransport};
use crate::config::CopilotConfig;

/// A usable Copilot credential: bearer token plus request-routing base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub token: String,
    pub base_url: String,
    pub source: TokenSource,
}

impl ResolvedCredential {
    /// Value for the `Authorization` header of Copilot API requests.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl From<CachedServiceToken> for ResolvedCredential {
    fn from(cached: CachedServiceToken) -> Self {
        Self {
            token: cached.token,
            base_url: cached.base_url,
            source: cached.source,
        }
    }
}

/// Entry point for anything that needs a Copilot credential.
///
/// Holds no state of its own between calls; everything lives in the cache.
///
/// # Example
/// ```no_run
/// use copilot_auth::auth::CredentialResolver;
/// use copilot_auth::config::CopilotConfig;
///
/// # async fn example() -> Result<(), copilot_auth::auth::AuthError> {
/// let resolver = CredentialResolver::from_config(&CopilotConfig::from_env()?)?;
/// let credential = resolver.resolve("gho_...", false).await?;
/// println!("{} via {}", credential.base_url, credential.source);
/// # Ok(())
/// # }
/// ```
pub struct CredentialResolver {
    cache: Arc<dyn TokenCache>,
    exchanger: TokenExchanger,
    expiry_buffer: Duration,
}

impl CredentialResolver {
    pub fn new(
        config: &CopilotConfig,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<dyn TokenCache>,
    ) -> Self {
        Self {
            exchanger: TokenExchanger::new(config, transport, cache.clone()),
            cache,
            expiry_buffer: config.expiry_buffer,
        }
    }

    /// Resolver over the real network and the configured cache file.
    pub fn from_config(config: &CopilotConfig) -> Result<Self, AuthError> {
        let transport = ReqwestTransport::new(config.request_timeout, &config.user_agent)?;
        let cache = FileTokenCache::new(config.cache_path.clone());
        Ok(Self::new(config, Arc::new(transport), Arc::new(cache)))
    }

    /// Cached credential if it outlives the expiry buffer, else a fresh exchange.
    pub async fn resolve(
        &self,
        identity_token: &str,
        force_refresh: bool,
    ) -> Result<ResolvedCredential, AuthError> {
        if !force_refresh {
            match self.cache.load() {
                Some(cached) if cached.is_valid(self.expiry_buffer) => {
                    tracing::debug!(base_url = %cached.base_url, "Using cached Copilot token");
                    return Ok(ResolvedCredential {
                        source: TokenSource::Cache,
                        ..ResolvedCredential::from(cached)
                    });
                }
                Some(_) => tracing::debug!("Cached Copilot token expired or expiring soon"),
                None => tracing::debug!("No cached Copilot token"),
            }
        }
        let fresh = self.exchanger.exchange(identity_token).await?;
        Ok(ResolvedCredential {
            source: TokenSource::Fresh,
            ..ResolvedCredential::from(fresh)
        })
    }

    /// Drop the cached token so the next `resolve` exchanges again.
    pub fn clear_cache(&self) -> Result<(), AuthError> {
        self.cache.clear()
    }

    pub fn cached(&self) -> Option<CachedServiceToken> {
        self.cache.load()
    }
}
