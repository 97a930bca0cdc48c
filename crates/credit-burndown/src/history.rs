//! Burn-down history
//!
//! One segment per phase, recording enough to replay the phase: balances and
//! overage going in, usage measured, and which grants absorbed it.

use credit_common::{GrantId, Period};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::balance::BalanceMap;
use crate::burn::decimal_sum;

/// Why a grant stopped absorbing usage within a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationReason {
    /// Balance reached zero
    Exhausted,
    /// Phase ended with balance left
    SegmentTerminated,
}

/// Usage absorbed by one grant in one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantUsage {
    /// Grant burned
    pub grant_id: GrantId,
    /// Amount taken from its balance
    pub usage: f64,
    /// Why burning stopped
    pub reason: TerminationReason,
}

/// Why a segment ended
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentTerminationReasons {
    /// Active grant set changed
    pub priority_change: bool,
    /// Grants resetting at the segment end
    pub recurrence: Vec<GrantId>,
}

/// One phase of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnDownSegment {
    /// Phase covered
    pub period: Period,
    /// Balances after activation and recurrence resets at phase start
    pub balance_at_start: BalanceMap,
    /// Overage carried in from the previous phase
    pub overage_at_start: f64,
    /// Usage measured in the phase
    pub total_usage: f64,
    /// Unfunded usage after the phase
    pub overage: f64,
    /// Ordered by burn priority
    pub grant_usages: Vec<GrantUsage>,
    /// Why the phase ended
    pub termination_reasons: SegmentTerminationReasons,
}

impl BurnDownSegment {
    /// Starting balances with this segment's usages applied
    ///
    /// Subtraction runs in decimal like the burn itself, so the result equals
    /// the balances the engine carried out of the phase.
    pub fn balance_at_end(&self) -> BalanceMap {
        let mut balances = self.balance_at_start.copy();
        for usage in &self.grant_usages {
            balances.burn(&usage.grant_id, usage.usage);
        }
        balances
    }

    /// Usage absorbed by grants
    pub fn total_burned(&self) -> f64 {
        decimal_sum(self.grant_usages.iter().map(|u| u.usage))
    }
}

/// Ordered, gapless segments of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BurnDownHistory(Vec<BurnDownSegment>);

impl BurnDownHistory {
    pub(crate) fn new(segments: Vec<BurnDownSegment>) -> Self {
        Self(segments)
    }

    /// Segments in time order
    pub fn segments(&self) -> &[BurnDownSegment] {
        &self.0
    }

    /// Take the segments
    pub fn into_segments(self) -> Vec<BurnDownSegment> {
        self.0
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the run produced no segments
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Usage measured over the whole run
    pub fn total_usage(&self) -> f64 {
        decimal_sum(self.0.iter().map(|s| s.total_usage))
    }

    /// Usage of the segments lying wholly inside `period`
    pub fn total_usage_in(&self, period: &Period) -> f64 {
        decimal_sum(
            self.0
                .iter()
                .filter(|s| period.encloses(&s.period))
                .map(|s| s.total_usage),
        )
    }

    /// Overage after the last segment
    pub fn overage_at_end(&self) -> Option<f64> {
        self.0.last().map(|s| s.overage)
    }

    /// Total usage absorbed by each grant across the run
    pub fn usage_by_grant(&self) -> BTreeMap<GrantId, f64> {
        let mut burns: BTreeMap<GrantId, Vec<f64>> = BTreeMap::new();
        for usage in self.0.iter().flat_map(|s| &s.grant_usages) {
            burns.entry(usage.grant_id.clone()).or_default().push(usage.usage);
        }
        burns
            .into_iter()
            .map(|(id, values)| (id, decimal_sum(values)))
            .collect()
    }
}
