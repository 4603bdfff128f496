#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use copilot_auth::auth::{
    AuthError, CachedServiceToken, HttpReply, HttpTransport, ReqwestTransport, TokenCache,
    TokenSource,
};
use copilot_auth::config::CopilotConfig;
use tokio::time::Instant;

type Fallback = Box<dyn Fn() -> Result<HttpReply, AuthError> + Send + Sync>;

/// Transport that replays queued replies and records when each call happened.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpReply, AuthError>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    fallback: Fallback,
}

impl ScriptedTransport {
    /// Once the queue is drained every call answers `authorization_pending`.
    pub fn new(replies: Vec<Result<HttpReply, AuthError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
            fallback: Box::new(|| Ok(oauth_error("authorization_pending"))),
        }
    }

    pub fn with_fallback(
        mut self,
        fallback: impl Fn() -> Result<HttpReply, AuthError> + Send + Sync + 'static,
    ) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    /// Gaps between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        self.call_times()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    fn next(&self, url: &str) -> Result<HttpReply, AuthError> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push((url.to_string(), Instant::now()));
        let queued = self.replies.lock().expect("replies lock poisoned").pop_front();
        queued.unwrap_or_else(|| (self.fallback)())
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_form(&self, url: &str, _form: &[(&str, &str)]) -> Result<HttpReply, AuthError> {
        self.next(url)
    }

    async fn get_with_token(
        &self,
        url: &str,
        _identity_token: &str,
    ) -> Result<HttpReply, AuthError> {
        self.next(url)
    }
}

/// Cache kept in memory, counting writes.
#[derive(Default)]
pub struct InMemoryTokenCache {
    slot: Mutex<Option<CachedServiceToken>>,
    saves: Mutex<usize>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(token: CachedServiceToken) -> Self {
        let cache = Self::default();
        *cache.slot.lock().expect("cache lock poisoned") = Some(token);
        cache
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().expect("cache lock poisoned")
    }
}

impl TokenCache for InMemoryTokenCache {
    fn load(&self) -> Option<CachedServiceToken> {
        self.slot.lock().expect("cache lock poisoned").clone()
    }

    fn save(&self, token: &CachedServiceToken) -> Result<(), AuthError> {
        *self.slot.lock().expect("cache lock poisoned") = Some(token.clone());
        *self.saves.lock().expect("cache lock poisoned") += 1;
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        *self.slot.lock().expect("cache lock poisoned") = None;
        Ok(())
    }
}

/// Cache whose writes always fail.
pub struct ReadOnlyTokenCache;

impl TokenCache for ReadOnlyTokenCache {
    fn load(&self) -> Option<CachedServiceToken> {
        None
    }

    fn save(&self, _token: &CachedServiceToken) -> Result<(), AuthError> {
        Err(AuthError::Io("read-only filesystem".to_string()))
    }

    fn clear(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

pub fn oauth_error(code: &str) -> HttpReply {
    HttpReply::new(200, format!(r#"{{"error":"{code}"}}"#))
}

pub fn granted(access_token: &str) -> HttpReply {
    HttpReply::new(
        200,
        format!(r#"{{"access_token":"{access_token}","token_type":"bearer","scope":"read:user"}}"#),
    )
}

pub fn cached_token(token: &str, expires_at: i64) -> CachedServiceToken {
    CachedServiceToken {
        token: token.to_string(),
        expires_at,
        base_url: "https://api.cached.githubcopilot.com".to_string(),
        source: TokenSource::Cache,
    }
}

/// Config pointing every endpoint at `base` and the cache under `dir`.
pub fn config_for(base: &str, dir: &Path) -> CopilotConfig {
    CopilotConfig::default()
        .with_device_code_url(format!("{base}/login/device/code"))
        .with_access_token_url(format!("{base}/login/oauth/access_token"))
        .with_copilot_token_url(format!("{base}/copilot_internal/v2/token"))
        .with_cache_path(dir.join("credentials").join("github-copilot.token.json"))
}

pub fn http_transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5), "copilot-auth-tests").expect("reqwest client")
}
