// =============================================================================
// Relative Strength Index (RSI): EWMA smoothing
// =============================================================================
//
// Step 1: delta_t = close_t - close_{t-1}; the first close has no delta.
// Step 2: up_t = max(delta_t, 0), down_t = max(-delta_t, 0).
// Step 3: roll_up / roll_down are span-`period` EWMAs of up / down, seeded
//          with the first delta.
// Step 4: RSI = 100 - 100 / (1 + roll_up / roll_down);
//          RSI = 100 when roll_down is zero.
// =============================================================================

use super::ema::Ewma;

/// Default look-back used by the indicator engine.
pub const RSI_PERIOD: usize = 14;

/// Streaming RSI over closes.
#[derive(Debug, Clone)]
pub struct RsiAccumulator {
    prev_close: Option<f64>,
    roll_up: Ewma,
    roll_down: Ewma,
}

impl RsiAccumulator {
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            roll_up: Ewma::with_span(period),
            roll_down: Ewma::with_span(period),
        }
    }

    /// Feed the next close. Returns `None` for the first close and whenever
    /// the result is non-finite.
    pub fn update(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        let delta = close - prev;

        let up = self.roll_up.update(delta.max(0.0));
        let down = self.roll_down.update((-delta).max(0.0));

        let rsi = if down == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + up / down)
        };

        rsi.is_finite().then_some(rsi)
    }
}
