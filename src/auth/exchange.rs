//! GitHub token -> Copilot API token exchange.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

use super::cache::{CachedServiceToken, TokenCache, TokenSource};
use super::error::AuthError;
use super::transport::HttpTransport;
use crate::config::{CopilotConfig, DEFAULT_COPILOT_BASE_URL};

/// Latest timestamp accepted as "seconds since epoch" (9999-12-31T23:59:59Z).
const MAX_EXPIRES_AT_SECS: i64 = 253_402_300_799;

/// Calls the Copilot token endpoint and records the result in the cache.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use copilot_auth::auth::{FileTokenCache, ReqwestTransport, TokenExchanger};
/// use copilot_auth::config::CopilotConfig;
///
/// # async fn example() -> Result<(), copilot_auth::auth::AuthError> {
/// let config = CopilotConfig::default();
/// let transport = Arc::new(ReqwestTransport::new(config.request_timeout, &config.user_agent)?);
/// let cache = Arc::new(FileTokenCache::new(config.cache_path.clone()));
/// let exchanger = TokenExchanger::new(&config, transport, cache);
/// let token = exchanger.exchange("gho_...").await?;
/// println!("{}", token.base_url);
/// # Ok(())
/// # }
/// ```
pub struct TokenExchanger {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn TokenCache>,
    copilot_token_url: String,
    default_base_url: String,
    default_lifetime: Duration,
}

impl TokenExchanger {
    pub fn new(
        config: &CopilotConfig,
        transport: Arc<dyn HttpTransport>,
        cache: Arc<dyn TokenCache>,
    ) -> Self {
        Self {
            transport,
            cache,
            copilot_token_url: config.copilot_token_url.clone(),
            default_base_url: config.default_base_url.clone(),
            default_lifetime: config.default_token_lifetime,
        }
    }

    pub async fn exchange(&self, identity_token: &str) -> Result<CachedServiceToken, AuthError> {
        let reply = self
            .transport
            .get_with_token(&self.copilot_token_url, identity_token)
            .await?;
        match reply.status {
            401 | 403 => return Err(AuthError::Unauthorized),
            404 => return Err(AuthError::NotFound),
            _ if !reply.is_success() => {
                return Err(AuthError::Http {
                    status: reply.status,
                    message: "Copilot token exchange failed".to_string(),
                })
            }
            _ => {}
        }

        let payload: CopilotTokenResponse = serde_json::from_str(&reply.body).map_err(|err| {
            AuthError::protocol(format!("Copilot token response is not valid JSON: {err}"))
        })?;
        let token = payload
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AuthError::protocol("Copilot token response has no token"))?;
        // Zero is the provider's "unset" and gets the default lifetime.
        let expires_at = match payload.expires_at {
            Some(value) if value.as_i64() != Some(0) => parse_expires_at(&value)?,
            _ => Utc::now().timestamp() + self.default_lifetime.as_secs() as i64,
        };
        let base_url = derive_base_url_or(&token, &self.default_base_url);

        let fresh = CachedServiceToken {
            token,
            expires_at,
            base_url,
            source: TokenSource::Fresh,
        };
        if let Err(err) = self.cache.save(&fresh) {
            tracing::warn!(error = %err, "Failed to persist Copilot token; continuing with fresh token");
        }
        tracing::info!(base_url = %fresh.base_url, expires_at = fresh.expires_at, "Exchanged GitHub token for Copilot token");
        Ok(fresh)
    }
}

#[derive(Debug, Deserialize)]
struct CopilotTokenResponse {
    token: Option<String>,
    expires_at: Option<serde_json::Value>,
}

/// `expires_at` must be integral seconds since the epoch; other shapes are rejected.
fn parse_expires_at(value: &serde_json::Value) -> Result<i64, AuthError> {
    let secs = value.as_i64().ok_or_else(|| {
        AuthError::protocol(format!(
            "Copilot token expires_at must be integer seconds, got {value}"
        ))
    })?;
    if !(0..=MAX_EXPIRES_AT_SECS).contains(&secs) {
        return Err(AuthError::protocol(format!(
            "Copilot token expires_at {secs} is out of range for seconds since epoch"
        )));
    }
    Ok(secs)
}

/// Routing endpoint embedded in a Copilot token's `proxy-ep` metadata.
///
/// `"tid=..;proxy-ep=proxy.individual.githubcopilot.com;.."` yields
/// `https://api.individual.githubcopilot.com`. Missing or unusable metadata
/// falls back to the default endpoint; this never fails.
pub fn derive_base_url(token: &str) -> String {
    derive_base_url_or(token, DEFAULT_COPILOT_BASE_URL)
}

fn derive_base_url_or(token: &str, default: &str) -> String {
    proxy_host(token)
        .map(|host| format!("https://{host}"))
        .unwrap_or_else(|| default.to_string())
}

fn proxy_host(token: &str) -> Option<String> {
    let value = token.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("proxy-ep")
            .then(|| value.trim())
    })?;
    let host = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .unwrap_or(value)
        .trim_end_matches('/');
    let host = match host.strip_prefix("proxy.") {
        Some(rest) => format!("api.{rest}"),
        None => host.to_string(),
    };
    let valid = !host.is_empty()
        && !host.starts_with('.')
        && !host.ends_with('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
    valid.then_some(host)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn proxy_endpoint_is_rewritten_to_api_host() {
        assert_eq!(
            derive_base_url("abc123;proxy-ep=proxy.individual.githubcopilot.com;"),
            "https://api.individual.githubcopilot.com"
        );
        assert_eq!(
            derive_base_url("tid=1;exp=2;proxy-ep=proxy.business.githubcopilot.com;sku=x"),
            "https://api.business.githubcopilot.com"
        );
    }

    #[test]
    fn scheme_in_proxy_endpoint_is_tolerated() {
        assert_eq!(
            derive_base_url("t;proxy-ep=https://proxy.enterprise.githubcopilot.com/"),
            "https://api.enterprise.githubcopilot.com"
        );
    }

    #[test]
    fn host_without_proxy_prefix_is_kept() {
        assert_eq!(
            derive_base_url("t;proxy-ep=copilot.example.com"),
            "https://copilot.example.com"
        );
    }

    #[test]
    fn missing_or_malformed_metadata_falls_back_to_default() {
        for token in [
            "abc123",
            "abc123;proxy-ep=;",
            "",
            ";;;",
            "abc;proxy-ep",
            "abc;proxy-ep=proxy.",
            "abc;proxy-ep=evil.com/path?x",
            "abc;proxy-ep=has space.com",
        ] {
            assert_eq!(
                derive_base_url(token),
                DEFAULT_COPILOT_BASE_URL,
                "token {token:?}"
            );
        }
    }

    #[test]
    fn expires_at_accepts_integer_seconds_only() {
        assert_eq!(parse_expires_at(&json!(1_700_000_000)).unwrap(), 1_700_000_000);
        assert!(matches!(
            parse_expires_at(&json!("1700000000")),
            Err(AuthError::Protocol { .. })
        ));
        assert!(matches!(
            parse_expires_at(&json!(1.5)),
            Err(AuthError::Protocol { .. })
        ));
        assert!(matches!(
            parse_expires_at(&json!(-1)),
            Err(AuthError::Protocol { .. })
        ));
        assert!(matches!(
            parse_expires_at(&json!(1_700_000_000_000_i64)),
            Err(AuthError::Protocol { message, .. }) if message.contains("out of range")
        ));
    }
}
