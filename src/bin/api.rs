use anyhow::Context;
use webhook_relay::core::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    webhook_relay::setup_logging();

    let config = AppConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;
    tracing::info!(config = ?config, "Loaded configuration");

    webhook_relay::api::start_server(config).await
}
