//! Pure computation engine: commission rule, daily aggregation, monthly
//! rollup, and the canonical source-row fingerprint.

use thiserror::Error;

pub mod daily;
pub mod fingerprint;
pub mod monthly;
pub mod rules;

pub use daily::{DailyAggregation, DailyAggregator};
pub use fingerprint::fingerprint_rows;
pub use rules::{evaluate, CommissionOutcome};

/// Engine-level error taxonomy.
///
/// Clone because results flow through shared in-flight futures: every caller
/// coalesced onto one recomputation receives the same error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The record store (or roster provider) failed or timed out.
    /// Recoverable by retry; never cached as a zero-value result.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    /// Requested date or month outside supported bounds; rejected before I/O.
    #[error("invalid range: {0}")]
    InvalidRange(String),
    /// Diagnostic recompute disagreed with its own verification pass.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),
    /// Cache storage failed.
    #[error("cache storage error: {0}")]
    Cache(String),
    #[error("internal error: {0}")]
    Internal(String),
}
