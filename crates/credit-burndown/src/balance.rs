//! Per-grant balance map

use credit_common::GrantId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::burn::{decimal_sub, decimal_sum};
use crate::grant::Grant;

/// Remaining balance of each grant
///
/// Iteration is ordered by grant id so snapshots compare and serialize
/// deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceMap(BTreeMap<GrantId, f64>);

impl BalanceMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Independent snapshot
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Balance of one grant
    pub fn get(&self, id: &GrantId) -> Option<f64> {
        self.0.get(id).copied()
    }

    /// Set absolute balance
    pub fn set(&mut self, id: GrantId, value: f64) {
        self.0.insert(id, value);
    }

    /// Subtract `amount` in decimal, returning the new balance
    pub fn burn(&mut self, id: &GrantId, amount: f64) -> f64 {
        let entry = self.0.entry(id.clone()).or_insert(0.0);
        *entry = decimal_sub(*entry, amount);
        debug_assert!(*entry >= 0.0, "grant {} burned below zero", id);
        *entry
    }

    /// Sum of all balances
    pub fn balance(&self) -> f64 {
        decimal_sum(self.0.values().copied())
    }

    /// Number of grants
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no grant has an entry
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in grant id order
    pub fn iter(&self) -> impl Iterator<Item = (&GrantId, f64)> {
        self.0.iter().map(|(id, v)| (id, *v))
    }

    /// True iff the key set equals the set of the grants' ids
    pub fn exactly_for_grants(&self, grants: &[Grant]) -> bool {
        let (missing, unexpected) = self.mismatch(grants);
        missing.is_empty() && unexpected.is_empty()
    }

    /// Grant ids with no entry, and entries with no grant
    pub fn mismatch(&self, grants: &[Grant]) -> (Vec<GrantId>, Vec<GrantId>) {
        let wanted: BTreeSet<&GrantId> = grants.iter().map(Grant::id).collect();
        let missing = wanted
            .iter()
            .filter(|id| !self.0.contains_key(**id))
            .map(|id| (*id).clone())
            .collect();
        let unexpected = self
            .0
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();
        (missing, unexpected)
    }
}

impl FromIterator<(GrantId, f64)> for BalanceMap {
    fn from_iter<I: IntoIterator<Item = (GrantId, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::{ExpirationDuration, ExpirationPeriod};
    use chrono::{TimeZone, Utc};

    fn id(s: &str) -> GrantId {
        GrantId::new(s).unwrap()
    }

    fn grant(s: &str) -> Grant {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Grant::builder(id(s), 100.0, t, ExpirationPeriod::new(ExpirationDuration::Day, 30))
            .build()
            .unwrap()
    }

    #[test]
    fn test_copy_is_independent() {
        let mut a: BalanceMap = [(id("g1"), 10.0)].into_iter().collect();
        let b = a.copy();
        a.set(id("g1"), 3.0);
        assert_eq!(a.get(&id("g1")), Some(3.0));
        assert_eq!(b.get(&id("g1")), Some(10.0));
    }

    #[test]
    fn test_burn_and_total() {
        let mut m: BalanceMap = [(id("g1"), 10.0), (id("g2"), 5.0)].into_iter().collect();
        assert_eq!(m.burn(&id("g1"), 4.0), 6.0);
        assert_eq!(m.balance(), 11.0);
    }

    #[test]
    fn test_fractional_burn_is_decimal() {
        let mut m: BalanceMap = [(id("g1"), 0.3), (id("g2"), 0.6)].into_iter().collect();
        assert_eq!(m.burn(&id("g1"), 0.1), 0.2);
        assert_eq!(m.balance(), 0.8);
    }

    #[test]
    fn test_exactly_for_grants() {
        let m: BalanceMap = [(id("g1"), 1.0), (id("g2"), 1.0)].into_iter().collect();

        assert!(m.exactly_for_grants(&[grant("g1"), grant("g2")]));
        assert!(!m.exactly_for_grants(&[grant("g1")]));
        assert!(!m.exactly_for_grants(&[grant("g1"), grant("g2"), grant("g3")]));
        assert!(!m.exactly_for_grants(&[grant("g1"), grant("g3")]));
    }

    #[test]
    fn test_duplicates_do_not_inflate_required_set() {
        let m: BalanceMap = [(id("g1"), 1.0)].into_iter().collect();
        assert!(m.exactly_for_grants(&[grant("g1"), grant("g1")]));
    }

    #[test]
    fn test_mismatch_reports_both_sides() {
        let m: BalanceMap = [(id("g1"), 1.0), (id("x"), 1.0)].into_iter().collect();
        let (missing, unexpected) = m.mismatch(&[grant("g1"), grant("g2")]);
        assert_eq!(missing, vec![id("g2")]);
        assert_eq!(unexpected, vec![id("x")]);
    }

    #[test]
    fn test_empty_map_matches_no_grants() {
        assert!(BalanceMap::new().exactly_for_grants(&[]));
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let m: BalanceMap = [(id("b"), 2.0), (id("a"), 1.0)].into_iter().collect();
        assert_eq!(serde_json::to_string(&m).unwrap(), r#"{"a":1.0,"b":2.0}"#);
    }
}
