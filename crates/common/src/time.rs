//! Wall-clock abstraction for token expiry checks
//!
//! Expiry decisions compare JWT `exp`/`iat` claims and stored expiry
//! timestamps against "now". Injecting a [`Clock`] keeps those decisions
//! deterministic in tests.
//!
//! # Examples
//!
//! ```
//! use chrono::Duration;
//!
//! use authlane_common::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::seconds(5));
//! assert_eq!(clock.now() - start, Duration::seconds(5));
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Seconds since the UNIX epoch.
    fn unix_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Real system clock. Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Clock frozen at the real current time.
    #[must_use]
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Clock frozen at `instant`.
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self { current: Arc::new(Mutex::new(instant)) }
    }

    /// Clock frozen at the given UNIX timestamp. Out-of-range values clamp
    /// to the epoch.
    #[must_use]
    pub fn at_unix(seconds: i64) -> Self {
        Self::at(Utc.timestamp_opt(seconds, 0).single().unwrap_or_default())
    }

    /// Simulate time passing.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        *current += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.current.lock() = instant;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
