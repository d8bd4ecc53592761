//! Market data error types

use thiserror::Error;

/// Errors raised inside the market data core.
///
/// None of these cross the service boundary: `MarketDataService` logs them and
/// answers with an empty series instead.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Requested look-back is negative
    #[error("Invalid range: days = {0}")]
    InvalidRange(i64),

    /// Synthetic generation or indicator computation failed
    #[error("Generation failed for {symbol}: {reason}")]
    Generation { symbol: String, reason: String },

    /// A cached entry failed its own invariants on read
    #[error("Cache entry for {symbol} is corrupt: {reason}")]
    CacheCorruption { symbol: String, reason: String },

    /// Caller deadline passed before a regeneration could start
    #[error("Deadline exceeded before generating {0}")]
    DeadlineExceeded(String),

    /// Administrative operation refused in this environment
    #[error("Operation not permitted in {0} environment")]
    AdminDisabled(String),
}

impl MarketDataError {
    pub fn generation(symbol: &str, reason: impl Into<String>) -> Self {
        Self::Generation {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketDataError>;
