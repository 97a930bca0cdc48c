//! Error types for credit value objects

use thiserror::Error;

/// Domain validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Grant identifier failed validation
    #[error("invalid grant ID: {0}")]
    InvalidGrantId(String),

    /// Period bounds are not ordered
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// Window size string is not one we know
    #[error("unsupported window size: {0}")]
    UnsupportedWindowSize(String),
}

/// Result type for domain validation
pub type DomainResult<T> = Result<T, DomainError>;
