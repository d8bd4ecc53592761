// =============================================================================
// Synthetic Series Generator: deterministic daily OHLCV random walk
// =============================================================================
//
// Stands in for a real market-data feed.  Every symbol maps to a fixed seed
// (64-bit FNV-1a of the symbol, mod 10 000), so the same (symbol, start, end)
// always yields the same series, across processes and restarts.
//
// Per trading day:
//   close    *= 1 + N(0.0005, 0.015)
//   range     = close * (0.005 + 0.03 U)
//   high/low  = close +/- U * range / 2, then one side extended to a full range
//   open      = prev_close * (1 + N(0, 0.007))      (first day: close-based)
//   high/low  widened to cover open and close
//   volume    = Gamma(2, 1e6) * (1 + 10 |change|)
//
// Clamping and widening run after the random extension and after the open is
// drawn; that order is what keeps low <= {open, close} <= high.
// =============================================================================

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, Normal};

use crate::error::{MarketDataError, Result};
use crate::types::{is_trading_day, Quote, Series};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Seeds are reduced into `[0, SEED_MODULUS)`.
const SEED_MODULUS: u64 = 10_000;
/// Mixed into the seed for the uniform stream so it differs from the
/// distribution stream.
const UNIFORM_STREAM: u64 = 0x9e37_79b9_7f4a_7c15;

const BASE_PRICE_MIN: f64 = 50.0;
const BASE_PRICE_SPAN: f64 = 200.0;
const DRIFT_MEAN: f64 = 0.0005;
const DRIFT_STD: f64 = 0.015;
const OPEN_GAP_STD: f64 = 0.007;
const RANGE_MIN_PCT: f64 = 0.005;
const RANGE_SPAN_PCT: f64 = 0.03;
const VOLUME_SHAPE: f64 = 2.0;
const VOLUME_SCALE: f64 = 1_000_000.0;
const VOLUME_CHANGE_BOOST: f64 = 10.0;

// =============================================================================
// SeriesSource: the contract the cache/service layer depends on
// =============================================================================

/// Anything that can produce a daily series for a symbol and date range.
///
/// Implementations must return trading-day-only dates in strictly increasing
/// order with `low <= {open, close} <= high`. A live-feed adapter implements
/// this trait to replace [`SeriesGenerator`].
pub trait SeriesSource: Send + Sync {
    fn generate(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Series>;
}

// =============================================================================
// Hashing & calendar helpers
// =============================================================================

/// 64-bit FNV-1a over the UTF-8 bytes of `s`.
pub fn fnv1a_64(s: &str) -> u64 {
    s.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// The per-symbol seed: `fnv1a_64(symbol) mod 10 000`.
pub fn symbol_seed(symbol: &str) -> u64 {
    fnv1a_64(symbol) % SEED_MODULUS
}

/// Monday to Friday dates in `[start, end]`, ascending. Empty when
/// `start > end`.
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .take_while(move |d| *d <= end)
        .filter(|d| is_trading_day(*d))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// =============================================================================
// SeriesGenerator
// =============================================================================

/// Deterministic synthetic OHLCV generator.
#[derive(Debug, Clone)]
pub struct SeriesGenerator {
    daily_change: Normal<f64>,
    open_gap: Normal<f64>,
    volume: Gamma<f64>,
}

impl SeriesGenerator {
    pub fn new() -> Result<Self> {
        let invalid = |e: &dyn std::fmt::Display| {
            MarketDataError::generation("*", format!("invalid distribution parameters: {e}"))
        };

        Ok(Self {
            daily_change: Normal::new(DRIFT_MEAN, DRIFT_STD).map_err(|e| invalid(&e))?,
            open_gap: Normal::new(0.0, OPEN_GAP_STD).map_err(|e| invalid(&e))?,
            volume: Gamma::new(VOLUME_SHAPE, VOLUME_SCALE).map_err(|e| invalid(&e))?,
        })
    }
}

impl SeriesSource for SeriesGenerator {
    fn generate(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Series> {
        let seed = symbol_seed(symbol);
        let mut dist_rng = StdRng::seed_from_u64(seed);
        let mut uniform_rng = StdRng::seed_from_u64(seed ^ UNIFORM_STREAM);

        let mut current_price = BASE_PRICE_MIN + uniform_rng.random::<f64>() * BASE_PRICE_SPAN;
        let mut prev_close: Option<f64> = None;
        let mut series = Series::new();

        for date in trading_days(start, end) {
            let daily_change = self.daily_change.sample(&mut dist_rng);
            current_price *= 1.0 + daily_change;

            let daily_range =
                current_price * (RANGE_MIN_PCT + RANGE_SPAN_PCT * uniform_rng.random::<f64>());
            let mut high = current_price + uniform_rng.random::<f64>() * daily_range / 2.0;
            let mut low = current_price - uniform_rng.random::<f64>() * daily_range / 2.0;

            if uniform_rng.random_bool(0.5) {
                low = current_price - daily_range;
            } else {
                high = current_price + daily_range;
            }

            high = high.max(current_price);
            low = low.min(current_price);

            let gap = 1.0 + self.open_gap.sample(&mut dist_rng);
            let open = prev_close.unwrap_or(current_price) * gap;

            high = high.max(open).max(current_price);
            low = low.min(open).min(current_price);

            let raw_volume =
                self.volume.sample(&mut dist_rng) * (1.0 + daily_change.abs() * VOLUME_CHANGE_BOOST);
            let volume = raw_volume.round().max(0.0) as u64;

            let quote = Quote::new(
                date,
                symbol,
                round2(open),
                round2(high),
                round2(low),
                round2(current_price),
                volume,
            );
            if !quote.is_consistent() {
                return Err(MarketDataError::generation(
                    symbol,
                    format!("degenerate prices on {date}: close = {current_price}"),
                ));
            }

            prev_close = Some(quote.close);
            series.push(quote);
        }

        Ok(series)
    }
}
