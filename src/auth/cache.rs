//! Single-slot, on-disk cache for the exchanged Copilot token.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::error::AuthError;

/// Where a [`CachedServiceToken`] came from on this call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TokenSource {
    #[default]
    Cache,
    Fresh,
}

/// Short-lived Copilot API token with its routing endpoint.
///
/// Serialized on disk as `{token, expires_at, base_url}`; `source` is not persisted
/// and reads back as [`TokenSource::Cache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedServiceToken {
    pub token: String,
    /// Seconds since the Unix epoch.
    pub expires_at: i64,
    pub base_url: String,
    #[serde(skip)]
    pub source: TokenSource,
}

impl CachedServiceToken {
    /// Usable iff `expires_at > now + buffer`.
    pub fn is_valid(&self, buffer: Duration) -> bool {
        self.is_valid_at(Utc::now().timestamp(), buffer)
    }

    pub fn is_valid_at(&self, now: i64, buffer: Duration) -> bool {
        let buffer = i64::try_from(buffer.as_secs()).unwrap_or(i64::MAX);
        self.expires_at > now.saturating_add(buffer)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.expires_at, 0)
    }
}

/// Storage for the exchanged token.
pub trait TokenCache: Send + Sync {
    /// Never fails: any unreadable or malformed record reads as `None`.
    fn load(&self) -> Option<CachedServiceToken>;
    fn save(&self, token: &CachedServiceToken) -> Result<(), AuthError>;
    fn clear(&self) -> Result<(), AuthError>;
}

/// JSON file cache. Writes go through a temp file and `rename`, so concurrent
/// readers only ever observe a complete record (last writer wins).
///
/// # Example
/// ```no_run
/// use copilot_auth::auth::{FileTokenCache, TokenCache};
///
/// let cache = FileTokenCache::new("/tmp/github-copilot.token.json");
/// let cached = cache.load();
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenCache for FileTokenCache {
    fn load(&self) -> Option<CachedServiceToken> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Failed to read token cache");
                return None;
            }
        };
        match serde_json::from_str::<CachedServiceToken>(&raw) {
            Ok(token) => Some(token),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "Ignoring malformed token cache");
                None
            }
        }
    }

    fn save(&self, token: &CachedServiceToken) -> Result<(), AuthError> {
        let serialized = serde_json::to_vec_pretty(token)?;
        atomic_write(&self.path, &serialized)?;
        tracing::debug!(path = %self.path.display(), "Saved token cache");
        Ok(())
    }

    fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Cleared token cache");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path.file_name().ok_or_else(|| {
        AuthError::Configuration(format!("Cache path {} has no file name", path.display()))
    })?;

    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(AuthError::Io(err.to_string()));
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(AuthError::Io(err.to_string()));
    }

    #[cfg(unix)]
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

    Ok(())
}
