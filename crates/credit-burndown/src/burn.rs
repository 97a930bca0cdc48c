//! Burn-Down Calculator
//!
//! Consumes usage against grant balances front to back. The arithmetic runs in
//! `Decimal` so that burning `a + b` at once and burning `a` then `b` leave
//! the same balances; values cross back to `f64` only at the edges.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::borrow::Borrow;

use crate::balance::BalanceMap;
use crate::error::{BurnDownError, Result};
use crate::grant::Grant;
use crate::history::{GrantUsage, TerminationReason};

/// Result of burning one phase
#[derive(Debug, Clone, PartialEq)]
pub struct BurnOutcome {
    /// Balances after the burn
    pub balances: BalanceMap,
    /// One entry per grant that absorbed usage, in burn order
    pub usages: Vec<GrantUsage>,
    /// Usage no grant could fund
    pub overage: f64,
    /// False if any decimal value did not survive conversion to `f64`
    pub exact: bool,
}

/// Burn `usage` against `grants`, which must already be in burn order
pub fn burn_down<G: Borrow<Grant>>(balances: &BalanceMap, grants: &[G], usage: f64) -> Result<BurnOutcome> {
    burn_down_decimal(balances, grants, to_decimal(usage, "usage")?)
}

pub(crate) fn burn_down_decimal<G: Borrow<Grant>>(
    balances: &BalanceMap,
    grants: &[G],
    usage: Decimal,
) -> Result<BurnOutcome> {
    let mut balances = balances.copy();
    let mut usages = Vec::new();
    let mut remaining = usage;
    let mut exact = true;

    for grant in grants {
        let grant = grant.borrow();
        let balance = to_decimal(balances.get(grant.id()).unwrap_or(0.0), grant.id().as_str())?;
        if balance.is_zero() {
            continue;
        }

        if balance <= remaining {
            remaining -= balance;
            balances.set(grant.id().clone(), 0.0);
            usages.push(GrantUsage {
                grant_id: grant.id().clone(),
                usage: to_f64(balance, &mut exact)?,
                reason: TerminationReason::Exhausted,
            });
        } else {
            let left = balance - remaining;
            balances.set(grant.id().clone(), to_f64(left, &mut exact)?);
            usages.push(GrantUsage {
                grant_id: grant.id().clone(),
                usage: to_f64(remaining, &mut exact)?,
                reason: TerminationReason::SegmentTerminated,
            });
            remaining = Decimal::ZERO;
            break;
        }
    }

    let overage = to_f64(remaining, &mut exact)?;
    tracing::debug!(
        usage = %usage,
        overage,
        grants_burned = usages.len(),
        "burned usage against grants"
    );

    Ok(BurnOutcome {
        balances,
        usages,
        overage,
        exact,
    })
}

/// Finite, non-negative `f64` into `Decimal`
pub(crate) fn to_decimal(value: f64, what: &str) -> Result<Decimal> {
    if !value.is_finite() || value < 0.0 {
        return Err(BurnDownError::InvalidAmount(format!("{} = {}", what, value)));
    }
    Decimal::from_f64(value)
        .ok_or_else(|| BurnDownError::InvalidAmount(format!("{} = {} exceeds decimal range", what, value)))
}

/// `a - b` in decimal, matching what the burn leaves behind
///
/// Falls back to float arithmetic for values with no decimal form.
pub(crate) fn decimal_sub(a: f64, b: f64) -> f64 {
    Decimal::from_f64(a)
        .zip(Decimal::from_f64(b))
        .and_then(|(a, b)| a.checked_sub(b))
        .and_then(|d| d.to_f64())
        .unwrap_or(a - b)
}

/// Sum in decimal, falling back to float addition for values with no
/// decimal form
pub(crate) fn decimal_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut float = 0.0;
    let mut exact = Some(Decimal::ZERO);
    for value in values {
        float += value;
        exact = exact
            .zip(Decimal::from_f64(value))
            .and_then(|(acc, v)| acc.checked_add(v));
    }
    exact.and_then(|d| d.to_f64()).unwrap_or(float)
}

/// `Decimal` into `f64`, clearing `exact` when the value does not round-trip
fn to_f64(value: Decimal, exact: &mut bool) -> Result<f64> {
    let out = value
        .to_f64()
        .ok_or_else(|| BurnDownError::InvalidAmount(format!("{} has no f64 form", value)))?;
    if Decimal::from_f64(out) != Some(value) {
        *exact = false;
    }
    Ok(out)
}
