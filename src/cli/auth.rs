//! CLI command handlers for login, token, status, and clear.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::auth::{
    login, AuthError, CredentialResolver, DeviceAuthorizer, FileTokenCache, HttpTransport,
    LoginOptions, ReqwestTransport, TokenCache,
};
use crate::cli::{LoginArgs, TokenArgs};
use crate::config::CopilotConfig;

const IDENTITY_TOKEN_ENV: &str = "GITHUB_COPILOT_TOKEN";

/// Handle `copilot-auth login`.
pub async fn handle_login(config: &CopilotConfig, args: &LoginArgs) -> Result<(), AuthError> {
    let transport = Arc::new(ReqwestTransport::new(
        config.request_timeout,
        &config.user_agent,
    )?);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    let result = login_and_verify(config, args, transport, &cancel).await;
    interrupt.abort();
    result
}

async fn login_and_verify(
    config: &CopilotConfig,
    args: &LoginArgs,
    transport: Arc<dyn HttpTransport>,
    cancel: &CancellationToken,
) -> Result<(), AuthError> {
    let authorizer = DeviceAuthorizer::new(config, transport.clone());
    let options = LoginOptions {
        open_browser: !args.no_browser,
    };
    let mut stderr = std::io::stderr();
    let github_token = login(&authorizer, options, &mut stderr, cancel).await?;
    eprintln!("✅ GitHub authorization successful");

    if !args.skip_verify {
        let cache = Arc::new(FileTokenCache::new(config.cache_path.clone()));
        let resolver = CredentialResolver::new(config, transport, cache);
        let credential = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Canceled),
            result = resolver.resolve(&github_token, true) => result?,
        };
        eprintln!("✅ Copilot access verified ({})", credential.base_url);
    }

    eprintln!("Store this token as {IDENTITY_TOKEN_ENV} to use it with `copilot-auth token`:");
    println!("{github_token}");
    Ok(())
}

/// Handle `copilot-auth token`.
pub async fn handle_token(config: &CopilotConfig, args: &TokenArgs) -> Result<(), AuthError> {
    let github_token = args
        .github_token
        .clone()
        .or_else(|| std::env::var(IDENTITY_TOKEN_ENV).ok())
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            AuthError::Configuration(format!(
                "No GitHub token: pass --github-token or set {IDENTITY_TOKEN_ENV} (see `copilot-auth login`)"
            ))
        })?;

    let resolver = CredentialResolver::from_config(config)?;
    let credential = resolver.resolve(&github_token, args.force_refresh).await?;

    let shown = if args.show_token {
        credential.token.clone()
    } else {
        mask_token(&credential.token)
    };
    println!("token:    {shown}");
    println!("base_url: {}", credential.base_url);
    println!("source:   {}", credential.source);
    Ok(())
}

/// Handle `copilot-auth status`.
pub fn handle_status(config: &CopilotConfig) -> Result<(), AuthError> {
    let cache = FileTokenCache::new(config.cache_path.clone());
    println!("🔐 Copilot token cache: {}\n", cache.path().display());

    match cache.load() {
        Some(cached) => {
            let expires = cached
                .expires_at_utc()
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| cached.expires_at.to_string());
            let status = if cached.is_valid(config.expiry_buffer) {
                "✅ Valid"
            } else if cached.expires_at > Utc::now().timestamp() {
                "⚠️  Expiring soon (will refresh)"
            } else {
                "⚠️  Expired (will refresh)"
            };
            println!("  Status:   {status}");
            println!("  Expires:  {expires}");
            println!("  Base URL: {}", cached.base_url);
        }
        None => println!("  Status:   ❌ No cached token"),
    }

    let env_status = if std::env::var(IDENTITY_TOKEN_ENV).is_ok() {
        "✅ Set"
    } else {
        "❌ Not set"
    };
    println!("\n📌 {IDENTITY_TOKEN_ENV}: {env_status}");
    Ok(())
}

/// Handle `copilot-auth clear`.
pub fn handle_clear(config: &CopilotConfig) -> Result<(), AuthError> {
    FileTokenCache::new(config.cache_path.clone()).clear()?;
    println!("✅ Cleared cached Copilot token");
    Ok(())
}

fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(6).collect();
    if visible.len() == token.len() {
        "*".repeat(token.chars().count())
    } else {
        format!("{visible}…")
    }
}
