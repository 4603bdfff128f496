//! copilot-auth — GitHub Copilot credentials
//!
//! Logs in with GitHub's OAuth device flow, exchanges the resulting GitHub
//! token for a short-lived Copilot API token, and caches that token on disk
//! until shortly before it expires.
//!
//! # Quick Start
//!
//! ```no_run
//! use copilot_auth::auth::CredentialResolver;
//! use copilot_auth::config::CopilotConfig;
//!
//! # async fn example() -> Result<(), copilot_auth::auth::AuthError> {
//! let resolver = CredentialResolver::from_config(&CopilotConfig::from_env()?)?;
//! let credential = resolver.resolve("gho_...", false).await?;
//! let header = credential.authorization_header();
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;

#[cfg(feature = "cli")]
pub mod cli;
