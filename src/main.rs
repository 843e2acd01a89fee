mod agent;
mod config;
mod llm;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::agent::Agent;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Secrets may come from a local .env file
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Startup aborted: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully");
    info!("  Provider: {}", config.llm.provider);
    info!("  Model: {}", config.llm.effective_model());

    let provider = llm::build_provider(&config.llm)?;
    let agent = Arc::new(Agent::new(provider, config.messages));

    info!("Bot is starting! Press Ctrl-C to stop.");
    platform::telegram::run(agent, &config.telegram.bot_token).await?;

    Ok(())
}
