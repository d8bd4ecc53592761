use chrono::{DateTime, Utc};

/// Source of "now" for freshness checks and date windows.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for TTL tests.
#[cfg(test)]
pub struct ManualClock {
    now: parking_lot::RwLock<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            now: parking_lot::RwLock::new(at),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.write() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
