//! Hookbridge binary.

use hookbridge_server::{HookbridgeConfig, WebhookHost, load_config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path)?,
        None => HookbridgeConfig::default(),
    };

    // Initialize tracing
    let level: tracing::Level = config.server.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    // Start the pipeline and run until interrupted
    let mut host = WebhookHost::new(config);
    host.start().await?;

    tokio::signal::ctrl_c().await?;
    host.shutdown().await;

    Ok(())
}
