//! Credit Burn-Down Engine
//!
//! Replays metered usage against prepaid credit grants over a period, in
//! priority order, producing ending balances, unfunded overage and a
//! segment-by-segment history.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BURN-DOWN ENGINE                                 │
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐                 │
//! │  │   Grants     │──►│   Scanner    │──►│   Phases     │                 │
//! │  │ + Recurrence │   │ activity and │   │ gapless cut  │                 │
//! │  └──────────────┘   │ resets       │   │ of period    │                 │
//! │                     └──────────────┘   └──────┬───────┘                 │
//! │                                               ▼                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐                 │
//! │  │ UsageQuery   │──►│   Engine     │──►│   Burn       │──► History      │
//! │  │ (async seam) │   │ one-shot run │   │ by priority  │    Balances     │
//! │  └──────────────┘   └──────────────┘   └──────────────┘    Overage      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use credit_burndown::{BalanceMap, Engine, EngineConfig, InMemoryUsage, Period};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo(period: Period) -> credit_burndown::Result<()> {
//! let mut engine = Engine::new(InMemoryUsage::new(), EngineConfig::default());
//! let result = engine
//!     .run(&CancellationToken::new(), vec![], BalanceMap::new(), 0.0, period)
//!     .await?;
//! println!("overage: {}", result.overage);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod balance;
pub mod burn;
pub mod config;
pub mod engine;
pub mod error;
pub mod grant;
pub mod history;
mod phases;
pub mod priority;
pub mod recurrence;
pub mod scanner;
pub mod usage;

pub use balance::BalanceMap;
pub use burn::{burn_down, BurnOutcome};
pub use config::EngineConfig;
pub use credit_common::{DomainError, GrantId, Period, WindowSize};
pub use engine::{Engine, EngineState, RunResult};
pub use error::{BurnDownError, Result};
pub use grant::{ExpirationDuration, ExpirationPeriod, Grant, GrantBuilder};
pub use history::{BurnDownHistory, BurnDownSegment, GrantUsage, SegmentTerminationReasons, TerminationReason};
pub use priority::{burn_order, prioritize};
pub use recurrence::{Recurrence, RecurrenceInterval};
pub use usage::{InMemoryUsage, QueryError, UsageEvent, UsageQuery};
