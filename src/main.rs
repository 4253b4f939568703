//! Errand Pricer: price recommendations for on-demand errands.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the pricing model, gateway and request store, and serves the
//! HTTP API until ctrl-c.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use errand_pricer::config;
use errand_pricer::llm::build_model;
use errand_pricer::pricing::PriceEstimationGateway;
use errand_pricer::server::{self, ServiceState};
use errand_pricer::storage::RequestStore;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("ERRAND_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    info!(
        service = %cfg.service.name,
        mode = %cfg.pricing.mode,
        region = %cfg.pricing.region,
        provider = %cfg.llm.provider,
        model = %cfg.llm.model,
        "Errand pricer starting up"
    );

    // -- Initialise components -------------------------------------------

    let model = build_model(cfg.model_endpoint()?)?;

    let gateway_config = cfg.gateway_config()?;
    if gateway_config.map_provider_api_key.is_none() {
        info!("No maps API key configured, route previews disabled");
    }
    let gateway = PriceEstimationGateway::new(model, gateway_config)
        .context("Failed to build price estimation gateway")?;

    let store = if cfg.storage.enabled {
        Some(RequestStore::connect(&cfg.storage.database_url).await?)
    } else {
        warn!("Request storage disabled, estimates will not be persisted");
        None
    };

    // -- Serve -----------------------------------------------------------

    let state = Arc::new(ServiceState::new(gateway, store.clone()));
    server::serve(state, cfg.bind_addr()?).await?;

    if let Some(store) = store {
        store.close().await;
    }
    info!("Errand pricer shut down cleanly");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("errand_pricer=info"));

    let json_logging = std::env::var("ERRAND_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
