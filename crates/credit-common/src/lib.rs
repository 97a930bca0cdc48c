//! Credit Common - Shared value objects for prepaid credit accounting
//!
//! This crate provides the small, validated primitives every credit crate
//! speaks in:
//! - Grant identifiers
//! - Half-open time periods
//! - Usage query granularity (window sizes)
//! - Domain validation errors
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CREDIT DOMAIN                          │
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │   GrantId    │  │    Period    │  │    WindowSize    │   │
//! │  │ (identity)   │  │ [from, to)   │  │ MINUTE|HOUR|DAY  │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Value objects are immutable, compared by value and self-validating.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::*;
