// =============================================================================
// Exponentially Weighted Moving Average (EWMA): span form
// =============================================================================
//
// alpha  = 2 / (span + 1)
// EWMA_0 = x_0
// EWMA_t = alpha * x_t + (1 - alpha) * EWMA_{t-1}
//
// No bias correction: the first observation seeds the average directly.
// =============================================================================

/// Single-state exponential accumulator.
#[derive(Debug, Clone)]
pub struct Ewma {
    alpha: f64,
    value: Option<f64>,
}

impl Ewma {
    /// Build from a span (`alpha = 2 / (span + 1)`).
    pub fn with_span(span: usize) -> Self {
        Self::with_alpha(2.0 / (span as f64 + 1.0))
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    /// Fold `x` into the average and return the new value.
    pub fn update(&mut self, x: f64) -> f64 {
        let next = match self.value {
            None => x,
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }
}
