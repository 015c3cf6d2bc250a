//! Injected "now" and detected-timezone capabilities.
//!
//! Nothing in this crate reads the ambient clock or the process timezone
//! directly; callers hand in a [`Clock`] and a [`TimezoneProvider`] so tests
//! can pin both.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Source of the display context's timezone (the "browser" zone).
pub trait TimezoneProvider: Send + Sync {
    fn detected(&self) -> Tz;
}

/// Reads `TZ` from the environment, falling back to a configured zone.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimezone {
    fallback: Tz,
}

impl SystemTimezone {
    pub fn new(fallback: Tz) -> Self {
        Self { fallback }
    }
}

impl Default for SystemTimezone {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::London)
    }
}

impl TimezoneProvider for SystemTimezone {
    fn detected(&self) -> Tz {
        std::env::var("TZ")
            .ok()
            .and_then(|name| name.trim_start_matches(':').parse::<Tz>().ok())
            .unwrap_or(self.fallback)
    }
}

/// Always reports the same zone.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimezone(pub Tz);

impl TimezoneProvider for FixedTimezone {
    fn detected(&self) -> Tz {
        self.0
    }
}
