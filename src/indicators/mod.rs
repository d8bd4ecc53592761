// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator math.  Every indicator is an incremental
// accumulator so a series is annotated in a single forward pass; values that
// are not yet defined (window not full, no previous close) stay `None`.

pub mod atr;
pub mod ema;
pub mod rsi;
pub mod sma;

use crate::error::{MarketDataError, Result};
use crate::types::Series;

use atr::{AtrAccumulator, ATR_PERIOD};
use rsi::{RsiAccumulator, RSI_PERIOD};
use sma::RollingMean;

pub const SMA_SHORT_PERIOD: usize = 20;
pub const SMA_LONG_PERIOD: usize = 50;

/// Fill `sma_20`, `sma_50`, `rsi` and `atr` on every record of `series`.
///
/// Output has the same length and order as the input. Fails only when a
/// record carries non-finite prices, which would poison every later value.
pub fn annotate(mut series: Series) -> Result<Series> {
    let mut sma_short = RollingMean::new(SMA_SHORT_PERIOD);
    let mut sma_long = RollingMean::new(SMA_LONG_PERIOD);
    let mut rsi = RsiAccumulator::new(RSI_PERIOD);
    let mut atr = AtrAccumulator::new(ATR_PERIOD);

    for quote in series.iter_mut() {
        if !(quote.close.is_finite() && quote.high.is_finite() && quote.low.is_finite()) {
            return Err(MarketDataError::generation(
                &quote.symbol,
                format!("non-finite prices on {}", quote.date),
            ));
        }

        quote.sma_20 = sma_short.update(quote.close);
        quote.sma_50 = sma_long.update(quote.close);
        quote.rsi = rsi.update(quote.close);
        quote.atr = atr.update(quote.high, quote.low, quote.close);
    }

    Ok(series)
}
