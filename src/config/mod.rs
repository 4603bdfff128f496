//! Configuration system (layered: code > env > config file > defaults).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::auth::AuthError;

pub const DEFAULT_CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";
pub const DEFAULT_SCOPE: &str = "read:user";
pub const DEFAULT_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const DEFAULT_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const DEFAULT_COPILOT_TOKEN_URL: &str = "https://api.github.com/copilot_internal/v2/token";
pub const DEFAULT_COPILOT_BASE_URL: &str = "https://api.individual.githubcopilot.com";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(300);
const DEFAULT_SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 60);

const CONFIG_PATH_ENV: &str = "COPILOT_AUTH_CONFIG";

/// Everything the credential components need, passed in explicitly.
///
/// # Example
/// ```no_run
/// use copilot_auth::config::CopilotConfig;
///
/// let config = CopilotConfig::default()
///     .with_cache_path("/tmp/copilot.token.json")
///     .with_copilot_token_url("http://127.0.0.1:8080/copilot_internal/v2/token");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopilotConfig {
    pub client_id: String,
    pub scope: String,
    pub device_code_url: String,
    pub access_token_url: String,
    pub copilot_token_url: String,
    pub default_base_url: String,
    pub cache_path: PathBuf,
    pub request_timeout: Duration,
    /// Tokens expiring within this window are treated as already expired.
    pub expiry_buffer: Duration,
    pub slow_down_increment: Duration,
    /// Lifetime assumed when the exchange response omits `expires_at`.
    pub default_token_lifetime: Duration,
    pub user_agent: String,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
            copilot_token_url: DEFAULT_COPILOT_TOKEN_URL.to_string(),
            default_base_url: DEFAULT_COPILOT_BASE_URL.to_string(),
            cache_path: default_cache_path(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            expiry_buffer: DEFAULT_EXPIRY_BUFFER,
            slow_down_increment: DEFAULT_SLOW_DOWN_INCREMENT,
            default_token_lifetime: DEFAULT_TOKEN_LIFETIME,
            user_agent: concat!("copilot-auth/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl CopilotConfig {
    /// Defaults, then the config file, then environment variables (`.env` honored).
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv();
        let config_path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);
        let mut config = Self::default();
        if let Some(file) = ConfigFile::load(&config_path)? {
            config.apply_file(file);
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    pub fn with_access_token_url(mut self, url: impl Into<String>) -> Self {
        self.access_token_url = url.into();
        self
    }

    pub fn with_copilot_token_url(mut self, url: impl Into<String>) -> Self {
        self.copilot_token_url = url.into();
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(v) = file.client_id {
            self.client_id = v;
        }
        if let Some(v) = file.scope {
            self.scope = v;
        }
        if let Some(v) = file.device_code_url {
            self.device_code_url = v;
        }
        if let Some(v) = file.access_token_url {
            self.access_token_url = v;
        }
        if let Some(v) = file.copilot_token_url {
            self.copilot_token_url = v;
        }
        if let Some(v) = file.default_base_url {
            self.default_base_url = v;
        }
        if let Some(v) = file.cache_path {
            self.cache_path = v;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.expiry_buffer_secs {
            self.expiry_buffer = Duration::from_secs(secs);
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), AuthError> {
        let string_mappings: [(&str, &mut String); 5] = [
            ("COPILOT_AUTH_CLIENT_ID", &mut self.client_id),
            ("COPILOT_AUTH_DEVICE_CODE_URL", &mut self.device_code_url),
            ("COPILOT_AUTH_ACCESS_TOKEN_URL", &mut self.access_token_url),
            ("COPILOT_AUTH_TOKEN_URL", &mut self.copilot_token_url),
            ("COPILOT_AUTH_BASE_URL", &mut self.default_base_url),
        ];
        for (key, slot) in string_mappings {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }

        if let Some(path) = lookup("COPILOT_AUTH_CACHE_PATH").filter(|v| !v.trim().is_empty()) {
            self.cache_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("COPILOT_AUTH_EXPIRY_BUFFER_SECS") {
            self.expiry_buffer = parse_secs("COPILOT_AUTH_EXPIRY_BUFFER_SECS", &raw)?;
        }
        if let Some(raw) = lookup("COPILOT_AUTH_TIMEOUT_SECS") {
            self.request_timeout = parse_secs("COPILOT_AUTH_TIMEOUT_SECS", &raw)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    client_id: Option<String>,
    scope: Option<String>,
    device_code_url: Option<String>,
    access_token_url: Option<String>,
    copilot_token_url: Option<String>,
    default_base_url: Option<String>,
    cache_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    expiry_buffer_secs: Option<u64>,
}

impl ConfigFile {
    fn load(path: &Path) -> Result<Option<Self>, AuthError> {
        let raw = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let file: ConfigFile = toml::from_str(&raw).map_err(|err| {
            AuthError::Configuration(format!("{}: {err}", path.display()))
        })?;
        Ok(Some(file))
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration, AuthError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| {
            AuthError::Configuration(format!(
                "{key} must be a whole number of seconds, got {raw:?}"
            ))
        })
}

fn app_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".copilot-auth"))
        .unwrap_or_else(|| PathBuf::from(".copilot-auth"))
}

/// `~/.copilot-auth/credentials/github-copilot.token.json`
pub fn default_cache_path() -> PathBuf {
    app_dir().join("credentials").join("github-copilot.token.json")
}

pub fn default_config_path() -> PathBuf {
    app_dir().join("config.toml")
}
