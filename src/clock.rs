//! Monotonic tick sources.
//!
//! One tick is one millisecond. Stored timestamps truncate ticks to the
//! record's field width (see [`crate::record`]); sources report untruncated
//! counts and callers mask at the point of use.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of millisecond-granularity monotonic ticks.
pub trait TickSource: Send + Sync {
    /// Current tick count. Monotonically non-decreasing.
    fn now_ticks(&self) -> u64;
}

/// Tick source backed by the process monotonic clock, counting milliseconds
/// since construction.
pub struct MonotonicTicks {
    epoch: Instant,
}

impl MonotonicTicks {
    /// Creates a source whose tick zero is now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for MonotonicTicks {
    fn now_ticks(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Manually advanced tick source for deterministic tests.
#[derive(Default)]
pub struct ManualTicks {
    ticks: AtomicU64,
}

impl ManualTicks {
    /// Creates a source positioned at `start` ticks.
    pub fn new(start: u64) -> Self {
        Self {
            ticks: AtomicU64::new(start),
        }
    }

    /// Moves the clock to an absolute tick count.
    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::Relaxed);
    }

    /// Advances the clock by `delta` ticks.
    pub fn advance(&self, delta: u64) {
        self.ticks.fetch_add(delta, Ordering::Relaxed);
    }
}

impl TickSource for ManualTicks {
    fn now_ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}
