pub mod cache;
pub mod clock;
pub mod generator;
pub mod service;

// Re-export the main entry points for convenient access (e.g. `use crate::market_data::MarketDataService`).
pub use cache::CacheStatsSnapshot;
pub use service::{MarketDataService, DEFAULT_DAYS, DEFAULT_MAX_DAYS};
