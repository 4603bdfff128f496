//! GitHub OAuth device-authorization flow.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::AuthError;
use super::transport::HttpTransport;
use crate::config::CopilotConfig;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const REQUIRED_FIELDS: [&str; 5] = [
    "device_code",
    "user_code",
    "verification_uri",
    "expires_in",
    "interval",
];
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(600);

/// Device/user code pair issued for one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    pub interval: u64,
    /// `expires_in` anchored to the moment the code was received.
    pub expires_at: DateTime<Utc>,
}

/// Outcome of a single token-endpoint poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCodePoll {
    Pending,
    /// Provider asked to back off; `interval` is its suggested interval, if sent.
    SlowDown { interval: Option<u64> },
    Authorized { identity_token: String },
    AccessDenied,
    Expired,
}

/// Drives the device flow against the identity provider.
///
/// Never touches the token cache; the only side effect of a completed flow is
/// the identity token handed back to the caller.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use copilot_auth::auth::{DeviceAuthorizer, ReqwestTransport};
/// use copilot_auth::config::CopilotConfig;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), copilot_auth::auth::AuthError> {
/// let config = CopilotConfig::default();
/// let transport = Arc::new(ReqwestTransport::new(config.request_timeout, &config.user_agent)?);
/// let authorizer = DeviceAuthorizer::new(&config, transport);
/// let authorization = authorizer.request_device_code().await?;
/// println!("Enter {} at {}", authorization.user_code, authorization.verification_uri);
/// let github_token = authorizer
///     .authorize(&authorization, &CancellationToken::new())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceAuthorizer {
    transport: Arc<dyn HttpTransport>,
    client_id: String,
    scope: String,
    device_code_url: String,
    access_token_url: String,
    slow_down_increment: Duration,
}

impl DeviceAuthorizer {
    pub fn new(config: &CopilotConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            client_id: config.client_id.clone(),
            scope: config.scope.clone(),
            device_code_url: config.device_code_url.clone(),
            access_token_url: config.access_token_url.clone(),
            slow_down_increment: config.slow_down_increment,
        }
    }

    pub async fn request_device_code(&self) -> Result<DeviceAuthorization, AuthError> {
        let reply = self
            .transport
            .post_form(
                &self.device_code_url,
                &[
                    ("client_id", self.client_id.as_str()),
                    ("scope", self.scope.as_str()),
                ],
            )
            .await?;
        if !reply.is_success() {
            return Err(AuthError::Http {
                status: reply.status,
                message: "Device code request failed".to_string(),
            });
        }

        let value: serde_json::Value = serde_json::from_str(&reply.body).map_err(|err| {
            AuthError::protocol(format!("Device code response is not valid JSON: {err}"))
        })?;
        let missing: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| value.get(field).map_or(true, serde_json::Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(AuthError::protocol(format!(
                "Missing required fields in device code response: {}",
                missing.join(", ")
            )));
        }
        let payload: DeviceCodeResponse = serde_json::from_value(value).map_err(|err| {
            AuthError::protocol(format!("Malformed device code response: {err}"))
        })?;

        tracing::debug!(
            verification_uri = %payload.verification_uri,
            expires_in = payload.expires_in,
            interval = payload.interval,
            "Device code requested"
        );
        let expires_at = i64::try_from(payload.expires_in)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::protocol(format!(
                    "Device code expires_in {} is out of range",
                    payload.expires_in
                ))
            })?;
        Ok(DeviceAuthorization {
            expires_at,
            device_code: payload.device_code,
            user_code: payload.user_code,
            verification_uri: payload.verification_uri,
            expires_in: payload.expires_in,
            interval: payload.interval,
        })
    }

    /// One request against the token endpoint, classified.
    pub async fn poll_once(&self, device_code: &str) -> Result<DeviceCodePoll, AuthError> {
        let reply = self
            .transport
            .post_form(
                &self.access_token_url,
                &[
                    ("client_id", self.client_id.as_str()),
                    ("device_code", device_code),
                    ("grant_type", DEVICE_CODE_GRANT),
                ],
            )
            .await?;
        let payload: DeviceTokenResponse = match serde_json::from_str(&reply.body) {
            Ok(payload) => payload,
            Err(_) if !reply.is_success() => {
                return Err(AuthError::Http {
                    status: reply.status,
                    message: "Device token request failed".to_string(),
                })
            }
            Err(err) => {
                return Err(AuthError::protocol(format!(
                    "Device token response is not valid JSON: {err}"
                )))
            }
        };

        if let Some(identity_token) = payload.access_token.filter(|t| !t.is_empty()) {
            return Ok(DeviceCodePoll::Authorized { identity_token });
        }
        match payload.error.as_deref() {
            Some("authorization_pending") => Ok(DeviceCodePoll::Pending),
            Some("slow_down") => Ok(DeviceCodePoll::SlowDown {
                interval: payload.interval,
            }),
            Some("expired_token") => Ok(DeviceCodePoll::Expired),
            Some("access_denied") => Ok(DeviceCodePoll::AccessDenied),
            Some(other) => Err(AuthError::provider(other, payload.error_description)),
            None if !reply.is_success() => Err(AuthError::Http {
                status: reply.status,
                message: "Device token request failed".to_string(),
            }),
            None => Err(AuthError::protocol(
                "Device token response missing token and error",
            )),
        }
    }

    /// Poll until the user approves, denies, or the code expires.
    ///
    /// Polls immediately, then every `interval` (held between 1 s and 10 min);
    /// each `slow_down` adds the configured increment on top of the current
    /// interval. Transport failures
    /// are retried until `expires_at`. Cancelling `cancel` aborts both the
    /// in-flight request and the sleep with [`AuthError::Canceled`].
    pub async fn poll_for_token(
        &self,
        device_code: &str,
        interval: Duration,
        expires_at: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError> {
        let remaining = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let deadline = Instant::now()
            .checked_add(remaining)
            .ok_or_else(|| AuthError::protocol("Device code expiry is out of range"))?;
        let mut interval = interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        let mut attempt: u32 = 0;

        loop {
            if Instant::now() >= deadline {
                tracing::debug!(attempt, "Device code expired while polling");
                return Err(AuthError::Expired);
            }
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Canceled),
                outcome = self.poll_once(device_code) => outcome,
            };
            match outcome {
                Ok(DeviceCodePoll::Authorized { identity_token }) => {
                    tracing::info!(attempt, "Device authorization granted");
                    return Ok(identity_token);
                }
                Ok(DeviceCodePoll::Pending) => {
                    tracing::debug!(attempt, "Authorization pending");
                }
                Ok(DeviceCodePoll::SlowDown {
                    interval: suggested,
                }) => {
                    let suggested = Duration::from_secs(suggested.unwrap_or(0));
                    interval = interval
                        .saturating_add(self.slow_down_increment)
                        .max(suggested)
                        .clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
                    tracing::debug!(
                        attempt,
                        interval_secs = interval.as_secs(),
                        "Provider asked to slow down"
                    );
                }
                Ok(DeviceCodePoll::Expired) => return Err(AuthError::Expired),
                Ok(DeviceCodePoll::AccessDenied) => return Err(AuthError::Denied),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(attempt, error = %err, "Device token poll failed; retrying");
                }
                Err(err) => return Err(err),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AuthError::Canceled),
                _ = tokio::time::sleep(interval.min(remaining)) => {}
            }
        }
    }

    /// [`Self::poll_for_token`] with the parameters of `authorization`.
    pub async fn authorize(
        &self,
        authorization: &DeviceAuthorization,
        cancel: &CancellationToken,
    ) -> Result<String, AuthError> {
        self.poll_for_token(
            &authorization.device_code,
            Duration::from_secs(authorization.interval),
            authorization.expires_at,
            cancel,
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    interval: u64,
}

#[derive(Debug, Deserialize)]
struct DeviceTokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    interval: Option<u64>,
}
