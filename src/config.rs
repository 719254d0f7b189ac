//! Runtime-tunable throttle settings.
//!
//! All fields are atomics so the hot decision path reads them without a
//! lock. Writes validate bounds and reject out-of-range values outright; the
//! prior value is retained, never clamped.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

use crate::error::{Result, ThrottleError};

/// Permitted range for the two millisecond thresholds (1 ms to 10 minutes).
pub const THRESHOLD_MS_BOUNDS: RangeInclusive<u64> = 1..=600_000;

/// Permitted range for the per-owner entry cap.
pub const MAX_ENTRIES_BOUNDS: RangeInclusive<u64> = 1_000..=10_000_000;

/// Tunable settings shared by every engine operation.
#[derive(Debug)]
pub struct ThrottleConfig {
    enabled: AtomicBool,
    throttle_duration_ms: AtomicU64,
    lifetime_expiration_ms: AtomicU64,
    max_entries_per_owner: AtomicU64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            throttle_duration_ms: AtomicU64::new(5000),
            lifetime_expiration_ms: AtomicU64::new(5000),
            max_entries_per_owner: AtomicU64::new(1_000_000),
        }
    }
}

impl ThrottleConfig {
    /// Whether the engine is globally enabled. Disabled engines answer
    /// "do not throttle" and record nothing.
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Enables or disables the engine.
    pub fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::Relaxed);
    }

    /// Window after a tracked demotion during which re-promotion is denied.
    pub fn throttle_duration_ms(&self) -> u64 {
        self.throttle_duration_ms.load(Ordering::Relaxed)
    }

    /// Sets the throttle window. Rejects values outside
    /// [`THRESHOLD_MS_BOUNDS`].
    pub fn set_throttle_duration_ms(&self, ms: u64) -> Result<()> {
        if !THRESHOLD_MS_BOUNDS.contains(&ms) {
            return Err(ThrottleError::InvalidSetting(format!(
                "promotion throttle duration {ms} ms out of range"
            )));
        }
        self.throttle_duration_ms.store(ms, Ordering::Relaxed);
        Ok(())
    }

    /// Fast-tier residency below which a demoted page counts as short-lived
    /// (the ping-pong signature).
    pub fn lifetime_expiration_ms(&self) -> u64 {
        self.lifetime_expiration_ms.load(Ordering::Relaxed)
    }

    /// Sets the lifetime threshold. Rejects values outside
    /// [`THRESHOLD_MS_BOUNDS`].
    pub fn set_lifetime_expiration_ms(&self, ms: u64) -> Result<()> {
        if !THRESHOLD_MS_BOUNDS.contains(&ms) {
            return Err(ThrottleError::InvalidSetting(format!(
                "promotion lifetime expiration {ms} ms out of range"
            )));
        }
        self.lifetime_expiration_ms.store(ms, Ordering::Relaxed);
        Ok(())
    }

    /// Soft cap on tracked entries per owner.
    pub fn max_entries_per_owner(&self) -> u64 {
        self.max_entries_per_owner.load(Ordering::Relaxed)
    }

    /// Sets the per-owner entry cap. Rejects values outside
    /// [`MAX_ENTRIES_BOUNDS`].
    pub fn set_max_entries_per_owner(&self, entries: u64) -> Result<()> {
        if !MAX_ENTRIES_BOUNDS.contains(&entries) {
            return Err(ThrottleError::InvalidSetting(format!(
                "max entries per owner {entries} out of range"
            )));
        }
        self.max_entries_per_owner.store(entries, Ordering::Relaxed);
        Ok(())
    }

    /// Consistent-enough snapshot of the current settings.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            enabled: self.enabled(),
            throttle_duration_ms: self.throttle_duration_ms(),
            lifetime_expiration_ms: self.lifetime_expiration_ms(),
            max_entries_per_owner: self.max_entries_per_owner(),
        }
    }
}

/// Point-in-time view of the settings, for reporting surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigSnapshot {
    /// Whether the engine is enabled.
    pub enabled: bool,
    /// Throttle window in milliseconds.
    pub throttle_duration_ms: u64,
    /// Lifetime threshold in milliseconds.
    pub lifetime_expiration_ms: u64,
    /// Soft per-owner entry cap.
    pub max_entries_per_owner: u64,
}
