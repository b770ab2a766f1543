//! Time provider abstraction
//!
//! Response metadata records unix timestamps. The engine reads them through a
//! [`Clock`] so that tests can pin time with [`FixedClock`].
//!
//! # Example
//!
//! ```
//! use survey_engine::{Clock, FixedClock};
//!
//! let clock = FixedClock::new(1_704_067_200);
//! assert_eq!(clock.now_secs(), 1_704_067_200);
//! clock.advance(30);
//! assert_eq!(clock.now_secs(), 1_704_067_230);
//! ```

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

/// A time provider for response metadata timestamps.
pub trait Clock: Send + Sync + Debug {
    /// Returns the current time as seconds since Unix epoch.
    fn now_secs(&self) -> i64;
}

/// Production clock using real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct FixedClock {
    secs: AtomicI64,
}

impl FixedClock {
    /// Create a clock reading `secs`.
    pub fn new(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the clock to a specific time.
    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_secs(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_does_not_move_by_itself() {
        let clock = FixedClock::new(1000);
        assert_eq!(clock.now_secs(), 1000);
        assert_eq!(clock.now_secs(), 1000);
    }

    #[test]
    fn fixed_clock_advance_and_set() {
        let clock = FixedClock::new(1000);
        clock.advance(5);
        assert_eq!(clock.now_secs(), 1005);
        clock.set(42);
        assert_eq!(clock.now_secs(), 42);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_secs() > 1_577_836_800);
    }
}
