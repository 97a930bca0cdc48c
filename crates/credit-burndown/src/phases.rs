//! Phase Partitioner
//!
//! Cuts a period into consecutive phases at every activity change and every
//! recurrence reset. Inside a phase the active grant set and the balances'
//! reset state are constant, so one usage query and one burn cover it.

use chrono::{DateTime, Utc};
use credit_common::{GrantId, Period, WindowSize};

use crate::error::Result;
use crate::grant::Grant;
use crate::scanner::{activity_changes, recurrence_times, RecurrenceBoundary};

/// Sub-period with the reasons it ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Phase {
    /// Inclusive start
    pub from: DateTime<Utc>,
    /// Exclusive end
    pub to: DateTime<Utc>,
    /// Active grant set changes at `to`
    pub priority_change: bool,
    /// Grants resetting at `to`
    pub recurred_grants: Vec<GrantId>,
}

impl Phase {
    fn closing(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            priority_change: false,
            recurred_grants: Vec::new(),
        }
    }
}

/// Phases of a run plus the resets due at its very start
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PhasePlan {
    /// Gapless, ascending
    pub phases: Vec<Phase>,
    /// Grants resetting before the first phase
    pub recurring_at_start: Vec<GrantId>,
}

pub(crate) fn compute_phases(grants: &[Grant], period: Period, granularity: WindowSize) -> Result<PhasePlan> {
    let activity = activity_changes(grants, period, granularity);
    let recurrence = recurrence_times(grants, period, granularity)?;

    Ok(PhasePlan {
        phases: partition(period, &activity, &recurrence.boundaries),
        recurring_at_start: recurrence.at_start,
    })
}

/// Merge-join two ascending instant streams into a gapless partition
pub(crate) fn partition(
    period: Period,
    activity: &[DateTime<Utc>],
    recurrences: &[RecurrenceBoundary],
) -> Vec<Phase> {
    let mut phases = Vec::with_capacity(activity.len() + recurrences.len() + 1);
    let mut phase_from = period.from();
    let (mut a, mut r) = (0, 0);

    while a < activity.len() && r < recurrences.len() {
        let change = activity[a];
        let reset = &recurrences[r];

        let mut phase = Phase::closing(phase_from, change.min(reset.at));
        if change <= reset.at {
            phase.priority_change = true;
            a += 1;
        }
        if reset.at <= change {
            phase.recurred_grants = reset.grants.clone();
            r += 1;
        }
        phase_from = phase.to;
        phases.push(phase);
    }

    for &change in &activity[a..] {
        let mut phase = Phase::closing(phase_from, change);
        phase.priority_change = true;
        phase_from = change;
        phases.push(phase);
    }

    for reset in &recurrences[r..] {
        let mut phase = Phase::closing(phase_from, reset.at);
        phase.recurred_grants = reset.grants.clone();
        phase_from = reset.at;
        phases.push(phase);
    }

    if phase_from < period.to() {
        phases.push(Phase::closing(phase_from, period.to()));
    }

    phases
}
