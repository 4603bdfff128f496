//! copilot-auth CLI binary entry point.

use clap::Parser;
use copilot_auth::auth::AuthError;
use copilot_auth::cli::{Cli, Commands};
use copilot_auth::config::CopilotConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("❌ {e}");
        if let Some(hint) = e.guidance() {
            eprintln!("   {hint}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AuthError> {
    let config = CopilotConfig::from_env()?;
    match cli.command {
        Commands::Login(args) => copilot_auth::cli::auth::handle_login(&config, &args).await,
        Commands::Token(args) => copilot_auth::cli::auth::handle_token(&config, &args).await,
        Commands::Status => copilot_auth::cli::auth::handle_status(&config),
        Commands::Clear => copilot_auth::cli::auth::handle_clear(&config),
    }
}
