//! HTTP seam between the credential components and the network.

use std::time::Duration;

use async_trait::async_trait;

use super::error::AuthError;

/// Status and raw body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal transport used by the authorizer and exchanger.
///
/// Implementations return `Err` only for transport failures (connect, timeout,
/// body read); every received status is handed back for the caller to classify.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply, AuthError>;

    /// `GET` authenticated with `Authorization: token <identity_token>`.
    async fn get_with_token(&self, url: &str, identity_token: &str)
        -> Result<HttpReply, AuthError>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpReply, AuthError> {
        let resp = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpReply { status, body })
    }

    async fn get_with_token(
        &self,
        url: &str,
        identity_token: &str,
    ) -> Result<HttpReply, AuthError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("Authorization", format!("token {identity_token}"))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        Ok(HttpReply { status, body })
    }
}
