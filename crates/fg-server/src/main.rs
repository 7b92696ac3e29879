//! fedgate engine entry point.

#![forbid(unsafe_code)]

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fg_core::EngineConfig;
use fg_server::{engine_router, EngineState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    let wayf_location =
        std::env::var("FEDGATE_WAYF").unwrap_or_else(|_| "http://localhost:8085/wayf".into());

    let bind = format!("{}:{}", config.server.host, config.server.port);
    let state = EngineState::initialise(config, wayf_location)?;

    tracing::info!(%bind, "fedgate engine starting");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, engine_router(state)).await?;
    Ok(())
}

/// Reads the engine configuration from `FEDGATE_CONFIG` (a JSON file), or
/// falls back to the defaults.
fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var("FEDGATE_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        Err(_) => Ok(EngineConfig::default()),
    }
}
