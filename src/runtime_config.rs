// =============================================================================
// Runtime Configuration: service settings from JSON and environment
// =============================================================================
//
// Loaded once at startup from a JSON file, then overridden by environment
// variables.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.  `max_days` is clamped to
// `MAX_DAYS_CEILING` on load.
//
// The cache TTL is not configurable; it is fixed at 15 minutes.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::market_data::{DEFAULT_DAYS, DEFAULT_MAX_DAYS};
use crate::types::Environment;

pub const DEFAULT_CONFIG_PATH: &str = "market_data_config.json";

/// Hard upper bound on `max_days`, roughly a century of calendar days.
pub const MAX_DAYS_CEILING: u32 = 36_500;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_days() -> i64 {
    DEFAULT_DAYS
}

fn default_max_days() -> u32 {
    DEFAULT_MAX_DAYS
}

fn default_warm_symbols() -> Vec<String> {
    vec![
        "AAPL".to_string(),
        "MSFT".to_string(),
        "GOOGL".to_string(),
        "AMZN".to_string(),
        "TSLA".to_string(),
    ]
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the market data service.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Deployment environment; production disables cache administration.
    #[serde(default)]
    pub environment: Environment,

    /// Look-back used when a request omits `days`.
    #[serde(default = "default_days")]
    pub default_days: i64,

    /// Requests asking for more calendar days than this are clamped.
    #[serde(default = "default_max_days")]
    pub max_days: u32,

    /// Symbols generated at startup so the first requests hit the cache.
    #[serde(default = "default_warm_symbols")]
    pub warm_symbols: Vec<String>,

    /// Address the HTTP surface listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            default_days: default_days(),
            max_days: default_max_days(),
            warm_symbols: default_warm_symbols(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;
        config.clamp_limits();

        info!(
            path = %path.display(),
            environment = %config.environment,
            warm_symbols = ?config.warm_symbols,
            "config loaded"
        );

        Ok(config)
    }

    /// Keep `max_days` within `MAX_DAYS_CEILING`.
    fn clamp_limits(&mut self) {
        if self.max_days > MAX_DAYS_CEILING {
            warn!(
                requested = self.max_days,
                ceiling = MAX_DAYS_CEILING,
                "max_days above ceiling, clamping"
            );
            self.max_days = MAX_DAYS_CEILING;
        }
    }

    /// Apply `MARKET_DATA_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(env) = lookup("MARKET_DATA_ENV") {
            match env.parse::<Environment>() {
                Ok(parsed) => self.environment = parsed,
                Err(e) => warn!(value = %env, error = %e, "ignoring MARKET_DATA_ENV"),
            }
        }

        if let Some(syms) = lookup("MARKET_DATA_SYMBOLS") {
            self.warm_symbols = parse_symbol_list(&syms);
        }

        if let Some(addr) = lookup("MARKET_DATA_BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.bind_addr = addr.trim().to_string();
            }
        }
    }
}

/// Split a comma-separated symbol list, upper-casing and dropping blanks.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
