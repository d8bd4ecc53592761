// =============================================================================
// Average True Range (ATR): simple rolling mean of True Range
// =============================================================================
//
// True Range for each bar:
//   TR_0 = H_0 - L_0
//   TR_t = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR_t is the arithmetic mean of the trailing `period` TR values (the first
// bar's TR included), undefined until `period` bars have been seen.
//
// Default period: 14
// =============================================================================

use super::sma::RollingMean;

pub const ATR_PERIOD: usize = 14;

/// True range of a bar given the previous close, if any.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    let hl = high - low;
    match prev_close {
        None => hl,
        Some(pc) => hl.max((high - pc).abs()).max((low - pc).abs()),
    }
}

/// Streaming ATR over (high, low, close) bars.
#[derive(Debug, Clone)]
pub struct AtrAccumulator {
    prev_close: Option<f64>,
    mean: RollingMean,
}

impl AtrAccumulator {
    pub fn new(period: usize) -> Self {
        Self {
            prev_close: None,
            mean: RollingMean::new(period),
        }
    }

    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = true_range(high, low, self.prev_close.replace(close));
        self.mean.update(tr).filter(|atr| atr.is_finite())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// `bars` are `(high, low, close)`, oldest first.
    fn run(bars: &[(f64, f64, f64)], period: usize) -> Vec<Option<f64>> {
        let mut atr = AtrAccumulator::new(period);
        bars.iter().map(|&(h, l, c)| atr.update(h, l, c)).collect()
    }

    #[test]
    fn atr_period_zero() {
        let bars = vec![(105.0, 95.0, 102.0); 20];
        assert!(run(&bars, 0).iter().all(Option::is_none));
    }

    #[test]
    fn atr_undefined_until_window_full() {
        let bars = vec![(105.0, 95.0, 100.0); 20];
        let out = run(&bars, ATR_PERIOD);
        assert!(out[..ATR_PERIOD - 1].iter().all(Option::is_none));
        assert!(out[ATR_PERIOD - 1..].iter().all(Option::is_some));
    }

    #[test]
    fn first_bar_uses_high_minus_low() {
        assert!((true_range(110.0, 100.0, None) - 10.0).abs() < 1e-12);
        let out = run(&[(110.0, 100.0, 105.0)], 1);
        assert!((out[0].unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn true_range_uses_prev_close_on_gap() {
        // Gap up: |115 - 95| = 20 > 115 - 108 = 7.
        assert!((true_range(115.0, 108.0, Some(95.0)) - 20.0).abs() < 1e-12);
        // Gap down: |90 - 110| = 20.
        assert!((true_range(95.0, 90.0, Some(110.0)) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn atr_is_mean_of_true_ranges() {
        let bars = [
            (102.0, 98.0, 101.0),
            (104.0, 99.0, 103.0),
            (106.0, 100.0, 105.0),
            (108.0, 102.0, 107.0),
        ];
        let out = run(&bars, 3);
        // TR = [4, 5, 6, 6]
        assert!((out[2].unwrap() - 5.0).abs() < 1e-12);
        assert!((out[3].unwrap() - 17.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn atr_is_non_negative() {
        let bars: Vec<(f64, f64, f64)> = (0..50)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.5).sin() * 10.0;
                (base + 2.0, base - 2.0, base + 0.5)
            })
            .collect();
        for v in run(&bars, ATR_PERIOD).into_iter().flatten() {
            assert!(v >= 0.0, "ATR must be non-negative, got {v}");
        }
    }
}
