// =============================================================================
// Synthetic Market Data Service: Main Entry Point
// =============================================================================
//
// Serves deterministic daily OHLCV series with SMA/RSI/ATR annotations from a
// per-symbol 15-minute cache.  The synthetic generator stands in for a live
// feed; anything implementing `SeriesSource` can replace it.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod error;
mod indicators;
mod market_data;
mod runtime_config;
mod types;

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::MarketDataService;
use crate::runtime_config::{RuntimeConfig, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Synthetic market data service starting up");

    let config_path =
        std::env::var("MARKET_DATA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides();

    info!(
        environment = %config.environment,
        default_days = config.default_days,
        max_days = config.max_days,
        "Configuration resolved"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let service = MarketDataService::synthetic(config.environment, config.max_days)?;
    let state = Arc::new(AppState::new(config, service));

    // ── 3. Warm the cache ────────────────────────────────────────────────
    let warm_state = state.clone();
    tokio::task::spawn_blocking(move || warm_state.warm_cache()).await?;

    // ── 4. Start the API server ──────────────────────────────────────────
    let bind_addr = state.config.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "API server listening");

    axum::serve(listener, api::rest::router(state.clone()))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            warn!("Shutdown signal received, stopping gracefully");
        })
        .await?;

    info!(
        uptime_secs = state.uptime_secs(),
        cache = ?state.market_data.cache_stats(),
        "Market data service shut down complete."
    );
    Ok(())
}
