//! Packed per-page migration record.
//!
//! Each tracked page stores one scalar: a truncated tick timestamp plus a
//! flag for the tier the page was last moved into. The timestamp field is
//! deliberately narrow so the whole record fits a lock-free-sized value;
//! elapsed-time math is wraparound-safe modulo the field width, so a clock
//! rolling over the field never yields a spurious huge age.

/// Width of the tick field inside a packed record.
pub const TICK_BITS: u32 = 22;

/// Mask selecting the tick field.
pub const TICK_MASK: u64 = (1 << TICK_BITS) - 1;

const SLOW_TIER_BIT: u64 = 1 << TICK_BITS;

/// One tracked page's migration history, packed into a single scalar.
///
/// Bits `0..22` hold the truncated tick timestamp of the last migration;
/// bit 22 is set when that migration left the page in the slow tier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecordBits(u64);

impl RecordBits {
    /// Packs a record. `ticks` is truncated to the tick field width.
    pub fn new(ticks: u64, slow_tier: bool) -> Self {
        let mut bits = ticks & TICK_MASK;
        if slow_tier {
            bits |= SLOW_TIER_BIT;
        }
        Self(bits)
    }

    /// Truncated tick timestamp of the last migration.
    pub fn ticks(self) -> u64 {
        self.0 & TICK_MASK
    }

    /// True when the page was last moved into the slow tier (a tracked
    /// demotion), making it a throttle candidate.
    pub fn slow_tier(self) -> bool {
        self.0 & SLOW_TIER_BIT != 0
    }
}

/// Wraparound-safe elapsed ticks between two truncated samples.
pub fn elapsed_ticks(now: u64, then: u64) -> u64 {
    now.wrapping_sub(then) & TICK_MASK
}
