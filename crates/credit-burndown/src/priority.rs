//! Grant Prioritizer

use std::borrow::Borrow;
use std::cmp::Ordering;

use crate::grant::Grant;

/// Billing order of two grants
///
/// Lower `priority` first, then the grant closest to expiry, then grant id so
/// the order is total and never depends on input order.
pub fn burn_order(a: &Grant, b: &Grant) -> Ordering {
    (a.priority(), a.expires_at(), a.id()).cmp(&(b.priority(), b.expires_at(), b.id()))
}

/// Sort grants into burn order; an empty slice is left as is
pub fn prioritize<G: Borrow<Grant>>(grants: &mut [G]) {
    grants.sort_by(|a, b| burn_order(a.borrow(), b.borrow()));
}
