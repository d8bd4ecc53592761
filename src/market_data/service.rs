// =============================================================================
// Market Data Service: cache-fronted series provisioning
// =============================================================================
//
// request -> CacheStore (fresh?) -> [miss] SeriesSource -> indicators -> store
//
// The public calls never fail: every internal error is logged and answered
// with an empty series, and a failure for one symbol never leaks into another
// symbol of the same batch.
// =============================================================================

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Days;
use tracing::{debug, error, warn};

use crate::error::{MarketDataError, Result};
use crate::indicators;
use crate::market_data::cache::{CacheStatsSnapshot, CacheStore};
use crate::market_data::clock::{Clock, SystemClock};
use crate::market_data::generator::{SeriesGenerator, SeriesSource};
use crate::types::{validate_series, Environment, Series, SymbolSeriesMap};

/// Look-back used when the caller does not specify one.
pub const DEFAULT_DAYS: i64 = 30;
/// Upper bound on a single request's look-back.
pub const DEFAULT_MAX_DAYS: u32 = 3650;

pub struct MarketDataService {
    source: Arc<dyn SeriesSource>,
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    environment: Environment,
    max_days: u32,
}

impl MarketDataService {
    pub fn new(
        source: Arc<dyn SeriesSource>,
        clock: Arc<dyn Clock>,
        environment: Environment,
        max_days: u32,
    ) -> Self {
        Self {
            source,
            cache: CacheStore::new(),
            clock,
            environment,
            max_days,
        }
    }

    /// Service backed by the synthetic generator and the wall clock.
    pub fn synthetic(environment: Environment, max_days: u32) -> Result<Self> {
        Ok(Self::new(
            Arc::new(SeriesGenerator::new()?),
            Arc::new(SystemClock),
            environment,
            max_days,
        ))
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[cfg(test)]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    // -------------------------------------------------------------------------
    // Single symbol
    // -------------------------------------------------------------------------

    /// Annotated daily series for `symbol` covering the last `days` calendar
    /// days. Empty on any failure.
    pub fn get_symbol_data(&self, symbol: &str, days: i64) -> Series {
        self.get_symbol_data_with_deadline(symbol, days, None)
    }

    /// Like [`Self::get_symbol_data`], but gives up (empty series) when a
    /// regeneration would have to start after `deadline`. A fresh cached
    /// series is still returned past the deadline.
    pub fn get_symbol_data_with_deadline(
        &self,
        symbol: &str,
        days: i64,
        deadline: Option<Instant>,
    ) -> Series {
        match self.try_get_symbol_data(symbol, days, deadline) {
            Ok(series) => series,
            Err(e @ MarketDataError::InvalidRange(_)) => {
                warn!(symbol = %symbol, days, error = %e, "look-back outside the calendar");
                Series::new()
            }
            Err(e @ MarketDataError::DeadlineExceeded(_)) => {
                warn!(symbol = %symbol, days, error = %e, "request abandoned before generation");
                Series::new()
            }
            Err(e) => {
                error!(symbol = %symbol, days, error = %e, "market data generation failed");
                Series::new()
            }
        }
    }

    fn try_get_symbol_data(
        &self,
        symbol: &str,
        days: i64,
        deadline: Option<Instant>,
    ) -> Result<Series> {
        let symbol = normalise_symbol(symbol);
        if symbol.is_empty() {
            debug!("empty symbol requested");
            return Ok(Series::new());
        }

        if days < 0 {
            debug!(
                symbol = %symbol,
                error = %MarketDataError::InvalidRange(days),
                "negative look-back treated as zero"
            );
            return Ok(Series::new());
        }
        if days == 0 {
            return Ok(Series::new());
        }
        let days = u32::try_from(days).unwrap_or(u32::MAX).min(self.max_days);

        let now = self.clock.now();
        let end = now.date_naive();
        let start = end
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or(MarketDataError::InvalidRange(i64::from(days)))?;

        if let Some(series) = self.cache.get_if_fresh(&symbol, days, now) {
            return Ok(series);
        }

        self.cache.get_or_refresh(&symbol, days, now, || {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(MarketDataError::DeadlineExceeded(symbol.clone()));
            }

            let generated = catch_unwind(AssertUnwindSafe(|| {
                self.source.generate(&symbol, start, end)
            }))
            .map_err(|_| MarketDataError::generation(&symbol, "series source panicked"))?;
            let raw = generated?;

            validate_series(&symbol, &raw)
                .map_err(|reason| MarketDataError::generation(&symbol, reason))?;
            let annotated = indicators::annotate(raw)?;

            debug!(
                symbol = %symbol,
                %start,
                %end,
                records = annotated.len(),
                "series generated"
            );
            Ok(annotated)
        })
    }

    // -------------------------------------------------------------------------
    // Multiple symbols
    // -------------------------------------------------------------------------

    /// One series per requested symbol, keyed and ordered as requested.
    /// Duplicate symbols collapse onto their first occurrence.
    pub fn get_multi_symbol_data<S: AsRef<str>>(&self, symbols: &[S], days: i64) -> SymbolSeriesMap {
        self.get_multi_symbol_data_with_deadline(symbols, days, None)
    }

    pub fn get_multi_symbol_data_with_deadline<S: AsRef<str>>(
        &self,
        symbols: &[S],
        days: i64,
        deadline: Option<Instant>,
    ) -> SymbolSeriesMap {
        let mut out = SymbolSeriesMap::new();
        for symbol in symbols {
            let symbol = symbol.as_ref();
            if out.contains_key(symbol) {
                continue;
            }
            let series = self.get_symbol_data_with_deadline(symbol, days, deadline);
            out.insert(symbol.to_string(), series);
        }
        out
    }

    // -------------------------------------------------------------------------
    // Administration
    // -------------------------------------------------------------------------

    /// Drop every cached series. Refused in production.
    pub fn clear_cache(&self) -> Result<usize> {
        if self.environment == Environment::Production {
            return Err(MarketDataError::AdminDisabled(self.environment.to_string()));
        }
        let removed = self.cache.clear();
        warn!(removed, "market data cache cleared");
        Ok(removed)
    }
}

fn normalise_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
