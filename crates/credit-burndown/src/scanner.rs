//! Activity & Recurrence Scanner
//!
//! Finds the instants inside a period at which the burn-down state changes:
//! a grant starting or stopping (activity), or a recurring grant resetting.
//! Every instant is aligned up to the usage window edge; usage between the raw
//! instant and the edge stays with the window that contains it.

use chrono::{DateTime, Utc};
use credit_common::{GrantId, Period, WindowSize};

use crate::error::{BurnDownError, Result};
use crate::grant::Grant;

/// Grants resetting at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceBoundary {
    /// Aligned reset instant
    pub at: DateTime<Utc>,
    /// Grants resetting there, sorted and unique
    pub grants: Vec<GrantId>,
}

/// Recurrence scan of a period
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurrenceScan {
    /// Grants whose reset aligns to the period start
    pub at_start: Vec<GrantId>,
    /// Resets strictly inside the period, ascending
    pub boundaries: Vec<RecurrenceBoundary>,
}

/// Aligned instants strictly inside the period where a grant starts or stops
pub fn activity_changes(grants: &[Grant], period: Period, granularity: WindowSize) -> Vec<DateTime<Utc>> {
    let mut changes: Vec<DateTime<Utc>> = grants
        .iter()
        .flat_map(|g| [Some(g.effective_at()), Some(g.expires_at()), g.deactivated_at()])
        .flatten()
        .filter_map(|t| granularity.align_up(t))
        .filter(|t| period.from() < *t && *t < period.to())
        .collect();

    changes.sort();
    changes.dedup();
    changes
}

/// Aligned reset instants of recurring grants
///
/// A grant recurs only while it is active at the raw occurrence; voided,
/// deleted or expired grants stop recurring for good.
pub fn recurrence_times(grants: &[Grant], period: Period, granularity: WindowSize) -> Result<RecurrenceScan> {
    let mut at_start = Vec::new();
    let mut resets: Vec<(DateTime<Utc>, GrantId)> = Vec::new();

    // Occurrences in (from - window, from] align to `from`.
    let lower = period
        .from()
        .checked_sub_signed(granularity.duration())
        .unwrap_or_else(|| period.from());

    for grant in grants {
        let Some(recurrence) = grant.recurrence() else {
            continue;
        };
        let wrap = |source: BurnDownError| BurnDownError::PhaseComputationFailed {
            grant: grant.id().clone(),
            source: Box::new(source),
        };

        let start = grant.effective_at().max(lower);
        for occurrence in recurrence.occurrences_from(start).map_err(wrap)? {
            let occurrence = occurrence.map_err(wrap)?;
            let Some(at) = granularity.align_up(occurrence) else {
                break;
            };
            if at >= period.to() || !grant.is_active_at(occurrence) {
                break;
            }

            if at == period.from() {
                at_start.push(grant.id().clone());
            } else if at > period.from() {
                resets.push((at, grant.id().clone()));
            }
        }
    }

    resets.sort();
    resets.dedup();
    at_start.sort();
    at_start.dedup();

    let mut boundaries: Vec<RecurrenceBoundary> = Vec::new();
    for (at, id) in resets {
        match boundaries.last_mut() {
            Some(last) if last.at == at => last.grants.push(id),
            _ => boundaries.push(RecurrenceBoundary { at, grants: vec![id] }),
        }
    }

    Ok(RecurrenceScan { at_start, boundaries })
}
