//! Clocks for drift-aware variables
//!
//! Timestamps are durations since the clock's own epoch, so a drift state
//! only ever compares readings taken from the same clock.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic time source
/// INVARIANT: successive `now()` readings never decrease
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since the clock's epoch
    fn now(&self) -> Duration;
}

/// Wall-clock time source backed by the monotonic OS clock
#[derive(Debug)]
pub struct SystemClock {
    reference: Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is now
    pub fn new() -> Self {
        SystemClock {
            reference: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.reference.elapsed()
    }
}

/// Hand-driven clock for tests and deterministic replays
///
/// Clones share the same underlying time, so a test can keep one handle
/// while the session owns another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    value: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Create a clock stopped at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock stopped at `start`
    pub fn starting_at(start: Duration) -> Self {
        ManualClock {
            value: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward by `dt`
    pub fn advance(&self, dt: Duration) -> Duration {
        let mut value = self.value.lock();
        *value = value.saturating_add(dt);
        *value
    }

    /// Jump to `target`; only moves forward
    pub fn sync_to(&self, target: Duration) {
        let mut value = self.value.lock();
        if target > *value {
            *value = target;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.value.lock()
    }
}
