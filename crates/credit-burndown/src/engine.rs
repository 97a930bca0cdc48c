//! Engine Orchestrator
//!
//! Drives one burn-down run end to end:
//!
//! ```text
//!  validate ─► prioritize ─► phases ─┬─► reset recurred / activated grants
//!                                    ├─► zero inactive grants
//!                                    ├─► query usage [from, to)
//!                                    ├─► burn usage + carried overage
//!                                    └─► record segment, carry state
//! ```
//!
//! An engine runs exactly once. The caller's grant list is moved in, so
//! concurrent runs on separate engines never share mutable state.

use chrono::{DateTime, Utc};
use credit_common::{GrantId, Period};
use tokio_util::sync::CancellationToken;

use crate::balance::BalanceMap;
use crate::burn::{burn_down_decimal, to_decimal};
use crate::config::EngineConfig;
use crate::error::{BurnDownError, Result};
use crate::grant::{Grant, GrantSet};
use crate::history::{BurnDownHistory, BurnDownSegment, SegmentTerminationReasons};
use crate::phases::compute_phases;
use crate::priority::prioritize;
use crate::usage::UsageQuery;

/// Lifecycle of an engine instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Ready to run
    Created,
    /// Run in progress
    Running,
    /// Run finished successfully
    Done,
    /// Run aborted with an error
    Errored,
}

/// Outcome of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Balances at the end of the period, one entry per grant
    pub balances: BalanceMap,
    /// Unfunded usage at the end of the period
    pub overage: f64,
    /// One segment per phase
    pub history: BurnDownHistory,
    /// False if any decimal value lost precision on its way back to `f64`
    pub exact: bool,
}

/// One-shot burn-down engine
pub struct Engine<Q> {
    query: Q,
    config: EngineConfig,
    state: EngineState,
}

impl<Q: UsageQuery> Engine<Q> {
    /// Create new engine
    pub fn new(query: Q, config: EngineConfig) -> Self {
        Self {
            query,
            config,
            state: EngineState::Created,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Burn usage in `period` against `grants`
    ///
    /// `starting_balances` must hold exactly one entry per grant id. On error
    /// no partial result is returned.
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
        grants: Vec<Grant>,
        starting_balances: BalanceMap,
        starting_overage: f64,
        period: Period,
    ) -> Result<RunResult> {
        if self.state != EngineState::Created {
            return Err(BurnDownError::AlreadyRun);
        }
        self.state = EngineState::Running;

        let result = self
            .execute(cancel, grants, starting_balances, starting_overage, period)
            .await;

        match &result {
            Ok(run) => {
                self.state = EngineState::Done;
                tracing::info!(
                    period = %period,
                    segments = run.history.len(),
                    overage = run.overage,
                    "burn-down run complete"
                );
                if !run.exact {
                    tracing::warn!(period = %period, "burn-down lost decimal precision converting to f64");
                }
            }
            Err(e) => {
                self.state = EngineState::Errored;
                tracing::warn!(period = %period, error = %e, "burn-down run aborted");
            }
        }

        result
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        grants: Vec<Grant>,
        starting_balances: BalanceMap,
        starting_overage: f64,
        period: Period,
    ) -> Result<RunResult> {
        self.config.validate()?;
        let granularity = self.config.granularity;

        if !granularity.is_aligned(period.from()) || !granularity.is_aligned(period.to()) {
            return Err(BurnDownError::UnalignedPeriod { period, granularity });
        }
        to_decimal(starting_overage, "starting overage")?;

        let (missing, unexpected) = starting_balances.mismatch(&grants);
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(BurnDownError::BalanceGrantMismatch { missing, unexpected });
        }

        let grants = GrantSet::new(grants);
        let mut ordered: Vec<&Grant> = grants.iter().collect();
        prioritize(&mut ordered);

        let plan = compute_phases(grants.as_slice(), period, granularity)?;
        tracing::debug!(period = %period, phases = plan.phases.len(), "computed burn-down phases");

        let mut balances = starting_balances;
        let mut overage = starting_overage;
        let mut segments = Vec::with_capacity(plan.phases.len());
        let mut exact = true;

        for (i, phase) in plan.phases.iter().enumerate() {
            let recurred: &[GrantId] = match i.checked_sub(1).map(|p| &plan.phases[p]) {
                Some(prev) => {
                    if prev.priority_change {
                        prioritize(&mut ordered);
                    }
                    &prev.recurred_grants
                }
                None => &plan.recurring_at_start,
            };

            for id in recurred {
                if let Some(grant) = grants.get(id) {
                    balances.set(id.clone(), grant.amount());
                }
            }

            let active = self.activate(&ordered, &mut balances, phase.from);

            let phase_period = Period::new(phase.from, phase.to)?;
            let usage = self.query_phase(cancel, phase_period).await?;

            let demand = to_decimal(usage, "usage")?
                .checked_add(to_decimal(overage, "overage")?)
                .ok_or_else(|| BurnDownError::InvalidAmount(format!("usage {} + overage {} overflows", usage, overage)))?;
            let balance_at_start = balances.copy();
            let burned = burn_down_decimal(&balances, &active, demand)?;

            tracing::debug!(
                phase = %phase_period,
                usage,
                active_grants = active.len(),
                overage = burned.overage,
                "burned phase"
            );

            exact &= burned.exact;
            let overage_at_start = std::mem::replace(&mut overage, burned.overage);
            balances = burned.balances;

            segments.push(BurnDownSegment {
                period: phase_period,
                balance_at_start,
                overage_at_start,
                total_usage: usage,
                overage: burned.overage,
                grant_usages: burned.usages,
                termination_reasons: SegmentTerminationReasons {
                    priority_change: phase.priority_change,
                    recurrence: phase.recurred_grants.clone(),
                },
            });
        }

        Ok(RunResult {
            balances,
            overage,
            history: BurnDownHistory::new(segments),
            exact,
        })
    }

    /// Zero inactive grants, fill newly activated ones, return the active
    /// grants in burn order
    fn activate<'a>(&self, ordered: &[&'a Grant], balances: &mut BalanceMap, at: DateTime<Utc>) -> Vec<&'a Grant> {
        let granularity = self.config.granularity;
        let mut active = Vec::with_capacity(ordered.len());

        for &grant in ordered {
            if !grant.is_active_at(at) {
                balances.set(grant.id().clone(), 0.0);
                continue;
            }
            if granularity.align_up(grant.effective_at()) == Some(at) {
                balances.set(grant.id().clone(), grant.amount());
            }
            active.push(grant);
        }

        active
    }

    async fn query_phase(&self, cancel: &CancellationToken, period: Period) -> Result<f64> {
        let query = self.query.query_usage(cancel, period);

        let outcome = match self.config.query_timeout() {
            Some(limit) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BurnDownError::Cancelled { period }),
                res = tokio::time::timeout(limit, query) => {
                    res.map_err(|_| BurnDownError::UsageQueryTimedOut { period })?
                }
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BurnDownError::Cancelled { period }),
                res = query => res,
            },
        };

        let usage = outcome.map_err(|source| BurnDownError::UsageQueryFailed { period, source })?;
        if !usage.is_finite() || usage < 0.0 {
            return Err(BurnDownError::InvalidUsage { period, value: usage });
        }
        Ok(usage)
    }
}
