//! Global engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters covering every outcome the engine can produce.
///
/// Increments are relaxed atomics; readers get an eventually-consistent
/// snapshot with no cross-counter atomicity, which is all the reporting
/// surface needs.
#[derive(Default, Debug)]
pub struct ThrottleStats {
    promotions_allowed: AtomicU64,
    promotions_throttled: AtomicU64,
    demotions_short_lived: AtomicU64,
    demotions_long_lived: AtomicU64,
    record_inserts_failed: AtomicU64,
    state_inconsistencies: AtomicU64,
}

impl ThrottleStats {
    pub(crate) fn promotion_allowed(&self) {
        self.promotions_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn promotion_throttled(&self) {
        self.promotions_throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn demotion_short_lived(&self) {
        self.demotions_short_lived.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn demotion_long_lived(&self) {
        self.demotions_long_lived.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert_failed(&self) {
        self.record_inserts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn state_inconsistency(&self) {
        self.state_inconsistencies.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all six counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            promotions_allowed: self.promotions_allowed.load(Ordering::Relaxed),
            promotions_throttled: self.promotions_throttled.load(Ordering::Relaxed),
            demotions_short_lived: self.demotions_short_lived.load(Ordering::Relaxed),
            demotions_long_lived: self.demotions_long_lived.load(Ordering::Relaxed),
            record_inserts_failed: self.record_inserts_failed.load(Ordering::Relaxed),
            state_inconsistencies: self.state_inconsistencies.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Promotion checks that found no reason to throttle.
    pub promotions_allowed: u64,
    /// Promotion checks denied inside the throttle window.
    pub promotions_throttled: u64,
    /// Demotions of pages that were short-lived in the fast tier.
    pub demotions_short_lived: u64,
    /// Demotions of pages that were long-lived in the fast tier.
    pub demotions_long_lived: u64,
    /// Record inserts dropped at the store's hard capacity.
    pub record_inserts_failed: u64,
    /// Records erased because they contradicted the caller-observed tier.
    pub state_inconsistencies: u64,
}
