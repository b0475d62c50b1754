//! Time source for deadline checks.

use std::sync::RwLock;

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time.
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

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Start at the current wall-clock second.
    #[must_use]
    pub fn starting_now() -> Self {
        let now = Utc::now();
        Self::new(DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now))
    }

    /// Move the clock to `to`.
    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now = to;
    }

    /// Move the clock forward by `secs` seconds. A move past the
    /// representable range leaves the clock where it is.
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(next) = TimeDelta::try_seconds(secs).and_then(|d| now.checked_add_signed(d)) {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
