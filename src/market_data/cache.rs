use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{MarketDataError, Result};
use crate::types::{validate_series, Series};

/// Cached series expire 15 minutes after generation.
pub const CACHE_TTL_SECS: i64 = 15 * 60;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// The most recent annotated series for a symbol.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub symbol: String,
    /// Look-back the series was generated for.
    pub days: u32,
    pub series: Series,
    pub generated_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.generated_at < ttl
    }
}

/// Lock-free counters describing cache behaviour.
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    corruptions: AtomicU64,
}

/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub refreshes: u64,
    pub corruptions: u64,
    pub tracked_symbols: usize,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

// ---------------------------------------------------------------------------
// CacheStore -- per-symbol TTL cache with single-flight refresh
// ---------------------------------------------------------------------------

/// Thread-safe store holding one [`CacheEntry`] per symbol.
///
/// The outer map lock is only held to find or create a symbol's slot. Each
/// slot has its own mutex; whoever holds it is the only caller allowed to
/// regenerate that symbol, and everyone else queued on it picks up the fresh
/// entry once it is released.
pub struct CacheStore {
    slots: RwLock<HashMap<String, Slot>>,
    ttl: Duration,
    stats: CacheStats,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(CACHE_TTL_SECS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl,
            stats: CacheStats::default(),
        }
    }

    fn existing_slot(&self, symbol: &str) -> Option<Slot> {
        self.slots.read().get(symbol).cloned()
    }

    fn slot(&self, symbol: &str) -> Slot {
        if let Some(slot) = self.existing_slot(symbol) {
            return slot;
        }
        self.slots
            .write()
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Return the cached series when it is fresh, valid and was built for the
    /// same look-back. A corrupt entry is dropped from the slot.
    fn fresh_series(
        &self,
        symbol: &str,
        days: u32,
        entry: &mut Option<CacheEntry>,
        now: DateTime<Utc>,
    ) -> Option<Series> {
        let cached = entry.as_ref()?;
        let check = if cached.symbol == symbol {
            validate_series(symbol, &cached.series)
        } else {
            Err(format!("entry belongs to {}", cached.symbol))
        };
        if let Err(reason) = check {
            let err = MarketDataError::CacheCorruption {
                symbol: symbol.to_string(),
                reason,
            };
            warn!(error = %err, "discarding cache entry");
            self.stats.corruptions.fetch_add(1, Ordering::Relaxed);
            *entry = None;
            return None;
        }

        if cached.days != days || !cached.is_fresh(now, self.ttl) {
            return None;
        }

        Some(cached.series.clone())
    }

    /// Fresh series for `symbol`, or `None` if absent, stale, corrupt or
    /// built for a different look-back. Never creates a slot.
    pub fn get_if_fresh(&self, symbol: &str, days: u32, now: DateTime<Utc>) -> Option<Series> {
        let slot = self.existing_slot(symbol)?;
        let mut entry = slot.lock();
        let series = self.fresh_series(symbol, days, &mut entry, now)?;
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        debug!(symbol = %symbol, days, records = series.len(), "cache hit");
        Some(series)
    }

    /// Store `series` for `symbol`, replacing whatever was there.
    pub fn put(&self, symbol: &str, days: u32, series: Series, now: DateTime<Utc>) {
        let slot = self.slot(symbol);
        *slot.lock() = Some(CacheEntry {
            symbol: symbol.to_string(),
            days,
            series,
            generated_at: now,
        });
    }

    /// Serve `symbol` from cache or run `refresh` to rebuild it.
    ///
    /// `refresh` runs while the symbol's slot is held, so concurrent callers
    /// for the same symbol block and then reuse its result. An error from
    /// `refresh` leaves the previous entry in place and is returned as is.
    pub fn get_or_refresh<F>(
        &self,
        symbol: &str,
        days: u32,
        now: DateTime<Utc>,
        refresh: F,
    ) -> Result<Series>
    where
        F: FnOnce() -> Result<Series>,
    {
        let slot = self.slot(symbol);
        let mut entry = slot.lock();

        if let Some(series) = self.fresh_series(symbol, days, &mut entry, now) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %symbol, days, records = series.len(), "cache hit");
            return Ok(series);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let series = refresh()?;
        self.stats.refreshes.fetch_add(1, Ordering::Relaxed);
        debug!(symbol = %symbol, days, records = series.len(), "cache refreshed");

        *entry = Some(CacheEntry {
            symbol: symbol.to_string(),
            days,
            series: series.clone(),
            generated_at: now,
        });
        Ok(series)
    }

    /// Drop every entry. Returns how many symbols held one.
    ///
    /// Slots stay in the map so a symbol that is mid-refresh keeps a single
    /// in-flight generation; clearing it waits for that generation and then
    /// drops its result.
    pub fn clear(&self) -> usize {
        let slots: Vec<Slot> = self.slots.read().values().cloned().collect();
        slots
            .iter()
            .filter(|slot| slot.lock().take().is_some())
            .count()
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            refreshes: self.stats.refreshes.load(Ordering::Relaxed),
            corruptions: self.stats.corruptions.load(Ordering::Relaxed),
            tracked_symbols: self.slots.read().len(),
        }
    }
}

#[cfg(test)]
impl CacheStore {
    /// Number of symbols currently holding an entry.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.read().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Quote;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::{mpsc, Barrier};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn sample(symbol: &str, close: f64) -> Series {
        vec![Quote::new(
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            symbol,
            close,
            close + 1.0,
            close - 1.0,
            close,
            100,
        )]
    }

    #[test]
    fn empty_store_misses() {
        let store = CacheStore::new();
        assert!(store.get_if_fresh("AAPL", 30, t0()).is_none());
        assert!(store.is_empty());
        assert_eq!(store.stats().tracked_symbols, 0);
    }

    #[test]
    fn freshness_boundary() {
        let store = CacheStore::new();
        store.put("AAPL", 30, sample("AAPL", 100.0), t0());

        let almost = t0() + Duration::seconds(CACHE_TTL_SECS - 1);
        assert!(store.get_if_fresh("AAPL", 30, almost).is_some());

        // now - generated_at == TTL is already stale.
        let exact = t0() + Duration::seconds(CACHE_TTL_SECS);
        assert!(store.get_if_fresh("AAPL", 30, exact).is_none());
    }

    #[test]
    fn put_overwrites_and_days_must_match() {
        let store = CacheStore::new();
        store.put("AAPL", 30, sample("AAPL", 100.0), t0());
        store.put("AAPL", 30, sample("AAPL", 200.0), t0());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_if_fresh("AAPL", 30, t0()).unwrap()[0].close, 200.0);
        assert!(store.get_if_fresh("AAPL", 90, t0()).is_none());
    }

    #[test]
    fn corrupt_entry_is_discarded() {
        let store = CacheStore::new();
        let mut bad = sample("AAPL", 100.0);
        bad[0].high = 50.0;
        store.put("AAPL", 30, bad, t0());

        assert!(store.get_if_fresh("AAPL", 30, t0()).is_none());
        assert_eq!(store.stats().corruptions, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn entry_filed_under_wrong_symbol_is_discarded() {
        let store = CacheStore::new();
        *store.slot("AAPL").lock() = Some(CacheEntry {
            symbol: "MSFT".to_string(),
            days: 30,
            series: sample("AAPL", 100.0),
            generated_at: t0(),
        });

        assert!(store.get_if_fresh("AAPL", 30, t0()).is_none());
        assert_eq!(store.stats().corruptions, 1);
    }

    #[test]
    fn refresh_runs_once_while_fresh() {
        let store = CacheStore::new();
        let calls = AtomicUsize::new(0);
        let refresh = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(sample("MSFT", 300.0))
        };

        let a = store.get_or_refresh("MSFT", 30, t0(), refresh).unwrap();
        let b = store
            .get_or_refresh("MSFT", 30, t0() + Duration::minutes(5), || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(sample("MSFT", 999.0))
            })
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = store.stats();
        assert_eq!((stats.hits, stats.misses, stats.refreshes), (1, 1, 1));
    }

    #[test]
    fn failed_refresh_keeps_previous_entry() {
        let store = CacheStore::new();
        store.put("AAPL", 30, sample("AAPL", 100.0), t0());

        let later = t0() + Duration::minutes(20);
        let err = store.get_or_refresh("AAPL", 30, later, || {
            Err(MarketDataError::generation("AAPL", "boom"))
        });
        assert!(err.is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_misses_refresh_once() {
        let store = Arc::new(CacheStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let calls = calls.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store
                        .get_or_refresh("TSLA", 30, t0(), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(50));
                            Ok(sample("TSLA", 250.0))
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<Series> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn clear_drops_everything() {
        let store = CacheStore::new();
        store.put("AAPL", 30, sample("AAPL", 100.0), t0());
        store.put("MSFT", 30, sample("MSFT", 100.0), t0());
        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
        assert_eq!(store.clear(), 0);
        // Symbols stay tracked; only their entries are gone.
        assert_eq!(store.stats().tracked_symbols, 2);
    }

    #[test]
    fn clear_keeps_slot_identity() {
        let store = CacheStore::new();
        store.put("AAPL", 30, sample("AAPL", 100.0), t0());
        let before = store.slot("AAPL");
        store.clear();
        assert!(Arc::ptr_eq(&before, &store.slot("AAPL")));
    }

    #[test]
    fn clear_waits_for_in_flight_refresh() {
        let store = Arc::new(CacheStore::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let refresher = {
            let store = store.clone();
            std::thread::spawn(move || {
                store
                    .get_or_refresh("AAPL", 30, t0(), || {
                        started_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                        Ok(sample("AAPL", 100.0))
                    })
                    .unwrap()
            })
        };
        started_rx.recv().unwrap();

        let clearer = {
            let store = store.clone();
            std::thread::spawn(move || store.clear())
        };
        // A caller arriving mid-refresh must queue on the same slot rather
        // than start a second generation.
        let released = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));
        let joiner = {
            let store = store.clone();
            let released = released.clone();
            let overlapped = overlapped.clone();
            std::thread::spawn(move || {
                store.get_or_refresh("AAPL", 30, t0(), || {
                    if !released.load(Ordering::SeqCst) {
                        overlapped.store(true, Ordering::SeqCst);
                    }
                    Ok(sample("AAPL", 100.0))
                })
            })
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(store.stats().tracked_symbols, 1);

        released.store(true, Ordering::SeqCst);
        release_tx.send(()).unwrap();
        assert!(!refresher.join().unwrap().is_empty());
        assert_eq!(clearer.join().unwrap(), 1);
        assert!(joiner.join().unwrap().is_ok());
        assert!(!overlapped.load(Ordering::SeqCst));
        assert_eq!(store.stats().tracked_symbols, 1);
    }
}
