//! The throttle engine: owner lifecycle, decision operations, reclaim.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::clock::{MonotonicTicks, TickSource};
use crate::config::ThrottleConfig;
use crate::evict::{evict_one_expired, shrink_store};
use crate::record::{elapsed_ticks, RecordBits, TICK_MASK};
use crate::registry::Registry;
use crate::stats::{StatsSnapshot, ThrottleStats};
use crate::store::{StoreSlot, TrackingStore};

/// Identity of a memory-owning context (one address space, one store).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct OwnerId(
    /// Raw owner identity.
    pub u64,
);

/// Page frame number: the stable page identity used as the store key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Pfn(
    /// Raw frame number.
    pub u64,
);

/// Why a promotion was denied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ThrottleReason {
    /// The page was demoted within the current throttle window.
    RecentlyDemoted,
}

/// Outcome of a promotion-throttle check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PromotionDecision {
    /// Proceed with the promotion.
    Allow,
    /// Deny the promotion for the given reason.
    Throttle(ThrottleReason),
}

impl PromotionDecision {
    /// True when the decision denies the promotion.
    pub fn is_throttled(self) -> bool {
        matches!(self, Self::Throttle(_))
    }
}

/// Migration-history tracker and promotion-throttle decision engine.
///
/// Thread-safe throughout: the fault path, the migration completion path,
/// and the pressure-reclaim path may all call in concurrently. Every
/// operation is a bounded critical section; none blocks on I/O, and none
/// surfaces a fatal error to its caller.
pub struct ThrottleEngine {
    config: Arc<ThrottleConfig>,
    stats: ThrottleStats,
    clock: Arc<dyn TickSource>,
    registry: Registry,
    owners: Mutex<FxHashMap<OwnerId, Arc<StoreSlot>>>,
    inconsistency_warned: AtomicBool,
}

impl Default for ThrottleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrottleEngine {
    /// Creates an engine on the process monotonic clock, disabled, with
    /// default settings.
    pub fn new() -> Self {
        Self::with_tick_source(Arc::new(MonotonicTicks::new()))
    }

    /// Creates an engine driven by the given tick source.
    pub fn with_tick_source(clock: Arc<dyn TickSource>) -> Self {
        Self {
            config: Arc::new(ThrottleConfig::default()),
            stats: ThrottleStats::default(),
            clock,
            registry: Registry::default(),
            owners: Mutex::new(FxHashMap::default()),
            inconsistency_warned: AtomicBool::new(false),
        }
    }

    /// The engine's tunable settings.
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Snapshot of the global counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn now(&self) -> u64 {
        self.clock.now_ticks() & TICK_MASK
    }

    fn slot(&self, owner: OwnerId) -> Option<Arc<StoreSlot>> {
        self.owners.lock().get(&owner).cloned()
    }

    /// Creates a fresh empty store for `owner`. An existing store for the
    /// same owner is replaced, its history discarded.
    pub fn create_store(&self, owner: OwnerId) {
        let store = TrackingStore::new();
        self.registry.register(&store);
        let slot = {
            let mut owners = self.owners.lock();
            Arc::clone(
                owners
                    .entry(owner)
                    .or_insert_with(|| Arc::new(StoreSlot::empty())),
            )
        };
        if let Some(displaced) = slot.replace(store) {
            self.registry.unregister(&displaced);
            debug!(owner = owner.0, "replaced existing tracking store");
        }
    }

    /// Creates a fresh empty store for a derived context. The child never
    /// inherits the parent's history.
    pub fn create_store_for_derived(&self, _parent: OwnerId, child: OwnerId) {
        self.create_store(child);
    }

    /// Tears down `owner`'s store. The pointer is nulled first so no new
    /// lookup can reach the store, then the store is unlinked from the
    /// registry; in-flight lookups that already hold the contents lock
    /// complete safely before the contents are freed.
    pub fn destroy_store(&self, owner: OwnerId) {
        let slot = self.owners.lock().remove(&owner);
        let Some(slot) = slot else { return };
        if let Some(store) = slot.clear() {
            self.registry.unregister(&store);
            debug!(
                owner = owner.0,
                entries = store.entry_count(),
                "destroyed tracking store"
            );
        }
    }

    /// Live-entry count for `owner`, zero for unknown owners.
    pub fn entry_count(&self, owner: OwnerId) -> usize {
        self.slot(owner)
            .and_then(|slot| slot.store())
            .map(|store| store.entry_count())
            .unwrap_or(0)
    }

    /// Checks whether promoting `page` (currently resident in the slow tier)
    /// should be denied.
    ///
    /// Returns [`PromotionDecision::Allow`] with no side effects when the
    /// engine is disabled or the owner has no store. A record claiming
    /// fast-tier residency contradicts the caller's observation and is
    /// treated as corrupted bookkeeping: erased, counted, and failed open.
    pub fn should_throttle_promotion(&self, owner: OwnerId, page: Pfn) -> PromotionDecision {
        if !self.config.enabled() {
            return PromotionDecision::Allow;
        }
        let Some(slot) = self.slot(owner) else {
            return PromotionDecision::Allow;
        };
        let Some(mut guard) = slot.lock_contents() else {
            return PromotionDecision::Allow;
        };
        let now = self.now();
        match guard.get(page.0) {
            None => {
                // First-time promotion.
                self.stats.promotion_allowed();
                PromotionDecision::Allow
            }
            Some(record) if !record.slow_tier() => {
                if !self.inconsistency_warned.swap(true, Ordering::Relaxed) {
                    warn!(pfn = page.0, "slow-tier candidate carried a fast-tier record");
                }
                guard.remove(page.0);
                self.stats.state_inconsistency();
                PromotionDecision::Allow
            }
            Some(record) => {
                if elapsed_ticks(now, record.ticks()) < self.config.throttle_duration_ms() {
                    self.stats.promotion_throttled();
                    PromotionDecision::Throttle(ThrottleReason::RecentlyDemoted)
                } else {
                    // Window expired: drop the record and start fresh.
                    guard.remove(page.0);
                    self.stats.promotion_allowed();
                    PromotionDecision::Allow
                }
            }
        }
    }

    /// Records a completed promotion of `old_page` (slow tier) to `new_page`
    /// (fast tier).
    pub fn record_promotion(&self, owner: OwnerId, old_page: Pfn, new_page: Pfn) {
        if !self.config.enabled() {
            return;
        }
        let Some(slot) = self.slot(owner) else { return };
        let Some(mut guard) = slot.lock_contents() else {
            return;
        };
        let now = self.now();
        if guard.len() as u64 >= self.config.max_entries_per_owner() {
            // Best effort: proceed even when nothing was reclaimable.
            evict_one_expired(&mut guard, now, &self.config);
        }
        guard.remove(old_page.0);
        if guard.insert(new_page.0, RecordBits::new(now, false)).is_err() {
            self.stats.record_insert_failed();
        }
    }

    /// Records a completed demotion of `old_page` (fast tier) to `new_page`
    /// (slow tier). A short fast-tier residency marks the new record as a
    /// throttle candidate; a long one ends tracking for the page.
    pub fn record_demotion(&self, owner: OwnerId, old_page: Pfn, new_page: Pfn) {
        if !self.config.enabled() {
            return;
        }
        let Some(slot) = self.slot(owner) else { return };
        let Some(mut guard) = slot.lock_contents() else {
            return;
        };
        let now = self.now();
        let Some(record) = guard.get(old_page.0) else {
            return;
        };
        if elapsed_ticks(now, record.ticks()) < self.config.lifetime_expiration_ms() {
            guard.remove(old_page.0);
            if guard.insert(new_page.0, RecordBits::new(now, true)).is_err() {
                self.stats.record_insert_failed();
            } else {
                self.stats.demotion_short_lived();
            }
        } else {
            guard.remove(old_page.0);
            self.stats.demotion_long_lived();
        }
    }

    /// Pressure-driven reclaim: frees up to `nr_to_free` expired entries
    /// across all registered stores, in registration order. Returns the
    /// number freed.
    pub fn reclaim(&self, nr_to_free: usize) -> usize {
        let now = self.now();
        let mut freed = 0;
        self.registry.for_each_live(|store| {
            if freed >= nr_to_free {
                return false;
            }
            let mut guard = store.lock();
            freed += shrink_store(&mut guard, nr_to_free - freed, now, &self.config);
            true
        });
        if freed > 0 {
            debug!(freed, "pressure reclaim pass");
        }
        freed
    }

    /// Cheap reclaimable estimate: total live entries across all registered
    /// stores, read without any contents lock.
    pub fn reclaimable_count(&self) -> usize {
        self.registry.reclaimable_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTicks;

    fn enabled_engine() -> (ThrottleEngine, Arc<ManualTicks>) {
        let clock = Arc::new(ManualTicks::new(0));
        let engine = ThrottleEngine::with_tick_source(clock.clone());
        engine.config().set_enabled(true);
        (engine, clock)
    }

    #[test]
    fn insert_failure_is_counted_and_page_left_untracked() {
        let (engine, _clock) = enabled_engine();
        let owner = OwnerId(1);
        engine.create_store(owner);

        // Swap in a store with a tiny hard limit to stand in for allocation
        // failure.
        let slot = engine.slot(owner).unwrap();
        let cramped = TrackingStore::with_hard_limit(1);
        engine.registry.register(&cramped);
        if let Some(displaced) = slot.replace(cramped) {
            engine.registry.unregister(&displaced);
        }

        engine.record_promotion(owner, Pfn(1), Pfn(2));
        engine.record_promotion(owner, Pfn(3), Pfn(4));
        assert_eq!(engine.stats().record_inserts_failed, 1);
        assert_eq!(engine.entry_count(owner), 1);
    }

    #[test]
    fn demotion_at_hard_limit_succeeds_via_its_own_erase() {
        let (engine, clock) = enabled_engine();
        let owner = OwnerId(1);
        engine.create_store(owner);

        let slot = engine.slot(owner).unwrap();
        let cramped = TrackingStore::with_hard_limit(1);
        engine.registry.register(&cramped);
        slot.replace(cramped);

        engine.record_promotion(owner, Pfn(1), Pfn(2));
        clock.advance(10);
        // The erase of the old key frees the only slot before the reinsert.
        engine.record_demotion(owner, Pfn(2), Pfn(5));
        assert_eq!(engine.stats().demotions_short_lived, 1);
        assert_eq!(engine.stats().record_inserts_failed, 0);
        assert_eq!(engine.entry_count(owner), 1);
    }

    #[test]
    fn unknown_owner_is_a_clean_no_op() {
        let (engine, _clock) = enabled_engine();
        let owner = OwnerId(42);
        assert_eq!(
            engine.should_throttle_promotion(owner, Pfn(1)),
            PromotionDecision::Allow
        );
        engine.record_promotion(owner, Pfn(1), Pfn(2));
        engine.record_demotion(owner, Pfn(2), Pfn(1));
        assert_eq!(engine.entry_count(owner), 0);
        assert_eq!(engine.stats(), StatsSnapshot::default());
    }
}
