//! Grants
//!
//! A grant is an allotment of credit that usage burns down. It becomes usable
//! at `effective_at`, stops at `expires_at` (derived once from the expiration
//! period), and can be cut short by voiding or deleting it.

use chrono::{DateTime, Duration, Months, Utc};
use credit_common::GrantId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{BurnDownError, Result};
use crate::recurrence::Recurrence;

/// Unit of an expiration period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpirationDuration {
    /// 60 minutes
    Hour,
    /// 24 hours
    Day,
    /// 7 days
    Week,
    /// Calendar month, clamped to month end
    Month,
    /// Calendar year
    Year,
}

/// How long a grant stays valid after it becomes effective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpirationPeriod {
    /// Unit
    pub duration: ExpirationDuration,
    /// Number of units, at least one
    pub count: u32,
}

impl ExpirationPeriod {
    /// Create expiration period
    pub fn new(duration: ExpirationDuration, count: u32) -> Self {
        Self { duration, count }
    }

    /// Expiry instant for a grant effective at `effective_at`
    pub fn expires_at(&self, effective_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let count = i64::from(self.count);
        let at = match self.duration {
            ExpirationDuration::Hour => Duration::try_hours(count)
                .and_then(|d| effective_at.checked_add_signed(d)),
            ExpirationDuration::Day => Duration::try_days(count)
                .and_then(|d| effective_at.checked_add_signed(d)),
            ExpirationDuration::Week => Duration::try_weeks(count)
                .and_then(|d| effective_at.checked_add_signed(d)),
            ExpirationDuration::Month => effective_at.checked_add_months(Months::new(self.count)),
            ExpirationDuration::Year => self
                .count
                .checked_mul(12)
                .and_then(|m| effective_at.checked_add_months(Months::new(m))),
        };

        at.ok_or_else(|| {
            BurnDownError::InvalidGrant(format!(
                "expiration {} x {:?} from {} is out of range",
                self.count, self.duration, effective_at
            ))
        })
    }
}

/// Credit grant
///
/// # Invariants
/// - `amount` is finite and non-negative
/// - `expires_at == expiration.expires_at(effective_at)`, fixed at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GrantRecord")]
pub struct Grant {
    id: GrantId,
    amount: f64,
    priority: u8,
    effective_at: DateTime<Utc>,
    expiration: ExpirationPeriod,
    expires_at: DateTime<Utc>,
    voided_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    recurrence: Option<Recurrence>,
}

/// Stored shape of a grant; `expires_at` is always re-derived
#[derive(Deserialize)]
struct GrantRecord {
    id: GrantId,
    amount: f64,
    #[serde(default)]
    priority: u8,
    effective_at: DateTime<Utc>,
    expiration: ExpirationPeriod,
    #[serde(default)]
    voided_at: Option<DateTime<Utc>>,
    #[serde(default)]
    deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    recurrence: Option<Recurrence>,
}

impl TryFrom<GrantRecord> for Grant {
    type Error = BurnDownError;

    fn try_from(r: GrantRecord) -> Result<Self> {
        let mut builder = Grant::builder(r.id, r.amount, r.effective_at, r.expiration)
            .priority(r.priority);
        if let Some(at) = r.voided_at {
            builder = builder.voided_at(at);
        }
        if let Some(at) = r.deleted_at {
            builder = builder.deleted_at(at);
        }
        if let Some(rec) = r.recurrence {
            builder = builder.recurrence(rec);
        }
        builder.build()
    }
}

impl Grant {
    /// Start building a grant
    pub fn builder(
        id: GrantId,
        amount: f64,
        effective_at: DateTime<Utc>,
        expiration: ExpirationPeriod,
    ) -> GrantBuilder {
        GrantBuilder {
            id,
            amount,
            priority: 0,
            effective_at,
            expiration,
            voided_at: None,
            deleted_at: None,
            recurrence: None,
        }
    }

    /// Grant identity
    pub fn id(&self) -> &GrantId {
        &self.id
    }

    /// Credit restored on activation and on every recurrence
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Lower values burn first
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Instant the grant becomes usable
    pub fn effective_at(&self) -> DateTime<Utc> {
        self.effective_at
    }

    /// Validity length after `effective_at`
    pub fn expiration(&self) -> ExpirationPeriod {
        self.expiration
    }

    /// First instant the grant is expired
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Void instant, if voided
    pub fn voided_at(&self) -> Option<DateTime<Utc>> {
        self.voided_at
    }

    /// Delete instant, if deleted
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Reset schedule, if recurring
    pub fn recurrence(&self) -> Option<&Recurrence> {
        self.recurrence.as_ref()
    }

    /// Instant from which voiding or deletion deactivates the grant
    pub fn deactivated_at(&self) -> Option<DateTime<Utc>> {
        match (self.voided_at, self.deleted_at) {
            (Some(v), Some(d)) => Some(v.min(d)),
            (v, d) => v.or(d),
        }
    }

    /// Check if grant can be burned at `t`
    pub fn is_active_at(&self, t: DateTime<Utc>) -> bool {
        self.effective_at <= t
            && t < self.expires_at
            && self.deactivated_at().map_or(true, |at| t < at)
    }
}

/// Validating grant builder
#[derive(Debug, Clone)]
pub struct GrantBuilder {
    id: GrantId,
    amount: f64,
    priority: u8,
    effective_at: DateTime<Utc>,
    expiration: ExpirationPeriod,
    voided_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    recurrence: Option<Recurrence>,
}

impl GrantBuilder {
    /// Burn priority, lower first
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Void from `at`
    pub fn voided_at(mut self, at: DateTime<Utc>) -> Self {
        self.voided_at = Some(at);
        self
    }

    /// Delete from `at`
    pub fn deleted_at(mut self, at: DateTime<Utc>) -> Self {
        self.deleted_at = Some(at);
        self
    }

    /// Reset to full amount on this schedule
    pub fn recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Validate and derive `expires_at`
    pub fn build(self) -> Result<Grant> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(BurnDownError::InvalidAmount(format!(
                "grant {} amount {}",
                self.id, self.amount
            )));
        }
        if self.expiration.count == 0 {
            return Err(BurnDownError::InvalidGrant(format!(
                "grant {} expiration count must be positive",
                self.id
            )));
        }

        let expires_at = self.expiration.expires_at(self.effective_at)?;

        Ok(Grant {
            id: self.id,
            amount: self.amount,
            priority: self.priority,
            effective_at: self.effective_at,
            expiration: self.expiration,
            expires_at,
            voided_at: self.voided_at,
            deleted_at: self.deleted_at,
            recurrence: self.recurrence,
        })
    }
}

/// Grants owned by one run, addressable by id
///
/// The first grant seen for an id wins; later duplicates are dropped.
#[derive(Debug, Clone, Default)]
pub(crate) struct GrantSet {
    grants: Vec<Grant>,
    index: HashMap<GrantId, usize>,
}

impl GrantSet {
    pub(crate) fn new(grants: Vec<Grant>) -> Self {
        let mut set = Self::default();
        for grant in grants {
            if set.index.contains_key(grant.id()) {
                tracing::debug!("Duplicate grant ignored: {}", grant.id());
                continue;
            }
            set.index.insert(grant.id().clone(), set.grants.len());
            set.grants.push(grant);
        }
        set
    }

    pub(crate) fn get(&self, id: &GrantId) -> Option<&Grant> {
        self.index.get(id).map(|&i| &self.grants[i])
    }

    pub(crate) fn as_slice(&self) -> &[Grant] {
        &self.grants
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Grant> {
        self.grants.iter()
    }
}
