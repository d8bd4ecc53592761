// =============================================================================
// Shared types used across the market data service
// =============================================================================

use chrono::{Datelike, NaiveDate, Weekday};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// One trading day's record for a symbol.
///
/// The four derived fields are filled in by the indicator engine and stay
/// `None` (serialised as `null`) until their look-back window is satisfied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    #[serde(default)]
    pub sma_20: Option<f64>,
    #[serde(default)]
    pub sma_50: Option<f64>,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub atr: Option<f64>,
}

impl Quote {
    /// Build a raw (un-annotated) quote.
    pub fn new(
        date: NaiveDate,
        symbol: impl Into<String>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            open,
            high,
            low,
            close,
            volume,
            sma_20: None,
            sma_50: None,
            rsi: None,
            atr: None,
        }
    }

    /// `low <= min(open, close)`, `high >= max(open, close)`, all prices
    /// finite and positive.
    pub fn is_consistent(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        self.low <= self.open.min(self.close) && self.high >= self.open.max(self.close)
    }
}

/// Ordered daily records for one symbol, oldest first.
pub type Series = Vec<Quote>;

/// Whether `date` falls on Monday to Friday.
pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Check the structural invariants every series handed to callers must hold:
/// one symbol, strictly increasing trading-day dates, consistent OHLC.
pub fn validate_series(symbol: &str, series: &[Quote]) -> Result<(), String> {
    for (i, quote) in series.iter().enumerate() {
        if quote.symbol != symbol {
            return Err(format!(
                "record {i} belongs to {} instead of {symbol}",
                quote.symbol
            ));
        }
        if !is_trading_day(quote.date) {
            return Err(format!("record {i} falls on a weekend ({})", quote.date));
        }
        if !quote.is_consistent() {
            return Err(format!("record {i} ({}) has inconsistent OHLC", quote.date));
        }
        if i > 0 && series[i - 1].date >= quote.date {
            return Err(format!("record {i} ({}) is not after its predecessor", quote.date));
        }
    }
    Ok(())
}

// =============================================================================
// SymbolSeriesMap
// =============================================================================

/// Symbol → series mapping that keeps the caller's requested order.
///
/// Serialises as a JSON object whose keys appear in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolSeriesMap {
    entries: Vec<(String, Series)>,
}

impl SymbolSeriesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `series` under `symbol`. Returns `false` (and keeps the first
    /// value) if the symbol is already present.
    pub fn insert(&mut self, symbol: String, series: Series) -> bool {
        if self.contains_key(&symbol) {
            return false;
        }
        self.entries.push((symbol, series));
        true
    }

    pub fn contains_key(&self, symbol: &str) -> bool {
        self.entries.iter().any(|(s, _)| s == symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.entries.iter().map(|(s, series)| (s.as_str(), series))
    }
}

#[cfg(test)]
impl SymbolSeriesMap {
    pub fn get(&self, symbol: &str) -> Option<&Series> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, series)| series)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(s, _)| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for SymbolSeriesMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (symbol, series) in &self.entries {
            map.serialize_entry(symbol, series)?;
        }
        map.end()
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Deployment environment. Administrative cache operations are refused in
/// production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Default for Environment {
    fn default() -> Self {
        Self::Development
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}
