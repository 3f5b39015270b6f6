//! Parlance - conversational client CLI
//!
#![doc = "Parlance - conversational client for chatflow prediction APIs"]
#![doc = "Main entry point for the command-line application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parlance::cli::{Cli, Commands};
use parlance::commands;
use parlance::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { mode, user } => {
            tracing::info!("Starting interactive chat session");
            if let Some(m) = &mode {
                tracing::debug!("Using mode override: {}", m);
            }
            if let Some(u) = &user {
                tracing::debug!("Using user override: {}", u);
            }
            commands::chat::run_chat(config, mode, user).await?;
            Ok(())
        }
        Commands::Jobs { query, json } => {
            tracing::info!("Running one-shot job query");
            commands::jobs::run_jobs(config, query, json).await?;
            Ok(())
        }
        Commands::Clear => {
            tracing::info!("Clearing persisted conversation history");
            commands::clear_history(&config)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parlance=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
