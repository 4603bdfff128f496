//! CLI entry point for copilot-auth.

pub mod auth;

use clap::{Parser, Subcommand};

/// GitHub Copilot credential helper
#[derive(Parser, Debug)]
#[command(
    name = "copilot-auth",
    version,
    about = "Log in to GitHub Copilot and manage cached API tokens"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with the GitHub device flow and print the GitHub token
    Login(LoginArgs),
    /// Print a usable Copilot API token and base URL
    Token(TokenArgs),
    /// Show the cached Copilot token status
    Status,
    /// Remove the cached Copilot token
    Clear,
}

/// Arguments for `copilot-auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Do not try to open the verification page in a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Skip the Copilot token exchange that verifies subscription access
    #[arg(long)]
    pub skip_verify: bool,
}

/// Arguments for `copilot-auth token`.
#[derive(Parser, Debug)]
pub struct TokenArgs {
    /// GitHub token to exchange (defaults to $GITHUB_COPILOT_TOKEN)
    #[arg(long)]
    pub github_token: Option<String>,

    /// Ignore the cache and exchange again
    #[arg(long)]
    pub force_refresh: bool,

    /// Print the Copilot token itself instead of a masked form
    #[arg(long)]
    pub show_token: bool,
}
