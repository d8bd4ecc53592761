// =============================================================================
// Central Application State
// =============================================================================
//
// Shared across request handlers via `Arc<AppState>`.  The service manages
// its own interior mutability, so nothing here needs an extra lock.
// =============================================================================

use std::time::Instant;

use tracing::info;

use crate::market_data::MarketDataService;
use crate::runtime_config::RuntimeConfig;

pub struct AppState {
    pub config: RuntimeConfig,
    pub market_data: MarketDataService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, market_data: MarketDataService) -> Self {
        Self {
            config,
            market_data,
            started_at: Instant::now(),
        }
    }

    /// Generate the configured warm-up symbols so early requests are served
    /// from cache. Returns how many came back non-empty.
    pub fn warm_cache(&self) -> usize {
        let data = self
            .market_data
            .get_multi_symbol_data(&self.config.warm_symbols, self.config.default_days);
        let warmed = data.iter().filter(|(_, series)| !series.is_empty()).count();
        info!(
            requested = self.config.warm_symbols.len(),
            warmed,
            days = self.config.default_days,
            "cache warm-up complete"
        );
        warmed
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
