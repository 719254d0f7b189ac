//! Migration-history tracking and promotion throttling for tiered memory.
//!
//! A page that bounces between a fast tier (local DRAM) and a slow tier
//! (e.g. CXL-attached memory) costs more in migration bandwidth than the
//! placement ever pays back. This crate keeps a per-owner record of recent
//! migrations, detects that ping-pong signature, and vetoes re-promotion of
//! pages that were demoted too recently, while leaving pages with no recent
//! history untouched.
//!
//! The entry point is [`ThrottleEngine`]: the host's fault path asks it
//! [`should_throttle_promotion`](ThrottleEngine::should_throttle_promotion)
//! before migrating a slow-tier page, and reports completed migrations via
//! [`record_promotion`](ThrottleEngine::record_promotion) and
//! [`record_demotion`](ThrottleEngine::record_demotion). All tracked state is
//! ephemeral: bounded per owner, expired by time, reclaimable under memory
//! pressure, and rebuilt purely from observed behavior.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod stats;

mod evict;
mod registry;
mod store;

pub use config::{ConfigSnapshot, ThrottleConfig};
pub use engine::{OwnerId, Pfn, PromotionDecision, ThrottleEngine, ThrottleReason};
pub use error::{Result, ThrottleError};
pub use stats::StatsSnapshot;
