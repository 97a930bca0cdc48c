//! Burn-down error types

use credit_common::{DomainError, GrantId, Period, WindowSize};
use thiserror::Error;

use crate::usage::QueryError;

/// Burn-down engine errors
///
/// Every variant is fatal to the enclosing run. Nothing is retried inside the
/// engine.
#[derive(Debug, Error)]
pub enum BurnDownError {
    /// Engine instance was already used for a run
    #[error("engine has already run")]
    AlreadyRun,

    /// Starting balances don't cover exactly the supplied grants
    #[error("starting balances do not match grants (missing: {missing:?}, unexpected: {unexpected:?})")]
    BalanceGrantMismatch {
        /// Grants with no starting balance
        missing: Vec<GrantId>,
        /// Balances for grants that were not supplied
        unexpected: Vec<GrantId>,
    },

    /// Usage backend returned an error
    #[error("usage query failed for {period}: {source}")]
    UsageQueryFailed {
        /// Phase being queried
        period: Period,
        /// Error from the usage backend
        #[source]
        source: QueryError,
    },

    /// Usage backend did not answer within the configured timeout
    #[error("usage query timed out for {period}")]
    UsageQueryTimedOut {
        /// Phase being queried
        period: Period,
    },

    /// Caller cancelled the run
    #[error("run cancelled while querying {period}")]
    Cancelled {
        /// Phase being queried
        period: Period,
    },

    /// Usage backend returned a negative or non-finite value
    #[error("usage query returned invalid value {value} for {period}")]
    InvalidUsage {
        /// Phase being queried
        period: Period,
        /// Value returned
        value: f64,
    },

    /// Recurrence interval string is not one we know
    #[error("unsupported recurrence interval: {0}")]
    UnsupportedRecurrenceInterval(String),

    /// Occurrence falls outside the representable date range
    #[error("recurrence out of range: {0}")]
    RecurrenceOutOfRange(String),

    /// Scanning a grant's schedule failed
    #[error("phase computation failed for grant {grant}: {source}")]
    PhaseComputationFailed {
        /// Grant being scanned
        grant: GrantId,
        /// Underlying recurrence error
        #[source]
        source: Box<BurnDownError>,
    },

    /// Amount is negative, NaN or too large for decimal arithmetic
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Period bounds are not on usage window edges
    #[error("period {period} is not aligned to {granularity} windows")]
    UnalignedPeriod {
        /// Requested period
        period: Period,
        /// Configured granularity
        granularity: WindowSize,
    },

    /// Grant failed validation
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// Engine configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Value object validation failed
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Result type for burn-down operations
pub type Result<T> = std::result::Result<T, BurnDownError>;
