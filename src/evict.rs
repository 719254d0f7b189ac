//! Expiry scanning shared by capacity eviction and pressure reclaim.

use crate::config::ThrottleConfig;
use crate::record::{elapsed_ticks, RecordBits, TICK_MASK};
use crate::store::StoreGuard;

/// Ticks a record may live before it is reclaimable: fast-tier records until
/// the lifetime threshold, slow-tier records until the throttle window
/// closes.
fn expiry_threshold(record: RecordBits, config: &ThrottleConfig) -> u64 {
    if record.slow_tier() {
        config.throttle_duration_ms()
    } else {
        config.lifetime_expiration_ms()
    }
}

fn is_expired(record: RecordBits, now_ticks: u64, config: &ThrottleConfig) -> bool {
    elapsed_ticks(now_ticks & TICK_MASK, record.ticks()) >= expiry_threshold(record, config)
}

/// Removes at most one expired entry. Best effort: an insert at the soft cap
/// calls this and proceeds regardless of whether anything was freed.
pub(crate) fn evict_one_expired(
    guard: &mut StoreGuard,
    now_ticks: u64,
    config: &ThrottleConfig,
) -> usize {
    guard.evict_where(1, |record| is_expired(record, now_ticks, config))
}

/// Bounded expiry sweep over one store, removing up to `nr_to_scan` expired
/// entries. Returns the number freed.
pub(crate) fn shrink_store(
    guard: &mut StoreGuard,
    nr_to_scan: usize,
    now_ticks: u64,
    config: &ThrottleConfig,
) -> usize {
    guard.evict_where(nr_to_scan, |record| is_expired(record, now_ticks, config))
}
