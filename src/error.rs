//! Error types for the throttle engine.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ThrottleError>;

/// Errors surfaced by the throttle engine.
///
/// Nothing here is fatal to the migration path: decision operations swallow
/// internal failures, degrade to "untracked, do not throttle", and expose
/// them only through counters. Errors reach callers solely at the settings
/// boundary and from the store's hard capacity check.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// A settings write fell outside its permitted bounds; the prior value
    /// is retained.
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    /// A tracking store refused an insert at its hard entry limit.
    #[error("tracking store at hard capacity")]
    StoreFull,
}
