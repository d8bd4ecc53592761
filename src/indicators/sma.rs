// =============================================================================
// Simple Moving Average (SMA): sliding-window running sum
// =============================================================================
//
// SMA_t = (x_{t-n+1} + ... + x_t) / n
//
// The window keeps the last `n` inputs and a running sum, so each update is
// O(1).  Nothing is emitted until the window holds `n` values.
// =============================================================================

use std::collections::VecDeque;

/// Incremental mean over the trailing `period` values.
#[derive(Debug, Clone)]
pub struct RollingMean {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period + 1),
            sum: 0.0,
        }
    }

    /// Push `value` and return the mean once the window is full.
    ///
    /// A zero period never becomes ready.
    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }

        self.window.push_back(value);
        self.sum += value;
        if self.window.len() > self.period {
            if let Some(old) = self.window.pop_front() {
                self.sum -= old;
            }
        }

        if self.window.len() == self.period {
            Some(self.sum / self.period as f64)
        } else {
            None
        }
    }
}
