//! Usage query seam
//!
//! The engine never talks to the metering store directly. It asks a
//! [`UsageQuery`] for the total usage of one owner/meter over a half-open
//! period, once per phase.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credit_common::Period;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Error returned by a usage backend
pub type QueryError = Box<dyn std::error::Error + Send + Sync>;

/// Total metered usage over a period
#[async_trait]
pub trait UsageQuery: Send + Sync {
    /// Usage in `[period.from, period.to)`
    ///
    /// Implementations doing I/O should stop early once `cancel` fires.
    async fn query_usage(&self, cancel: &CancellationToken, period: Period) -> Result<f64, QueryError>;
}

#[async_trait]
impl<T: UsageQuery + ?Sized> UsageQuery for Arc<T> {
    async fn query_usage(&self, cancel: &CancellationToken, period: Period) -> Result<f64, QueryError> {
        (**self).query_usage(cancel, period).await
    }
}

/// Usage measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// When the usage happened
    pub timestamp: DateTime<Utc>,
    /// Metered quantity
    pub value: f64,
    /// Dedup key; repeated keys are recorded once
    pub idempotency_key: Option<String>,
}

impl UsageEvent {
    /// Event without idempotency key
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            idempotency_key: None,
        }
    }

    /// Attach idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// In-memory usage log (for testing and development)
#[derive(Default)]
pub struct InMemoryUsage {
    events: RwLock<Vec<UsageEvent>>,
    processed: RwLock<HashSet<String>>,
}

impl InMemoryUsage {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(timestamp, value)` pairs
    pub fn from_events(events: impl IntoIterator<Item = (DateTime<Utc>, f64)>) -> Self {
        let usage = Self::new();
        for (timestamp, value) in events {
            usage.record(UsageEvent::new(timestamp, value));
        }
        usage
    }

    /// Record usage event (idempotent)
    pub fn record(&self, event: UsageEvent) {
        if let Some(ref key) = event.idempotency_key {
            if !self.processed.write().insert(key.clone()) {
                tracing::debug!("Duplicate usage event ignored: {}", key);
                return;
            }
        }
        self.events.write().push(event);
    }

    /// Sum of values with timestamp in the period
    pub fn total(&self, period: Period) -> f64 {
        self.events
            .read()
            .iter()
            .filter(|e| period.contains(e.timestamp))
            .map(|e| e.value)
            .sum()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl UsageQuery for InMemoryUsage {
    async fn query_usage(&self, cancel: &CancellationToken, period: Period) -> Result<f64, QueryError> {
        if cancel.is_cancelled() {
            return Err("usage query cancelled".into());
        }
        Ok(self.total(period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_sums_half_open_period() {
        let usage = InMemoryUsage::from_events([
            (t0(), 1.0),
            (t0() + Duration::minutes(30), 2.0),
            (t0() + Duration::hours(1), 4.0),
        ]);
        let period = Period::new(t0(), t0() + Duration::hours(1)).unwrap();

        let total = usage.query_usage(&CancellationToken::new(), period).await.unwrap();
        assert_eq!(total, 3.0);
    }

    #[tokio::test]
    async fn test_idempotent_record() {
        let usage = InMemoryUsage::new();
        usage.record(UsageEvent::new(t0(), 5.0).with_idempotency_key("evt-1"));
        usage.record(UsageEvent::new(t0(), 5.0).with_idempotency_key("evt-1"));
        usage.record(UsageEvent::new(t0(), 1.0));

        assert_eq!(usage.len(), 2);
        let period = Period::new(t0(), t0() + Duration::minutes(1)).unwrap();
        assert_eq!(usage.total(period), 6.0);
    }

    #[tokio::test]
    async fn test_cancelled_token_fails_query() {
        let usage = Arc::new(InMemoryUsage::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let period = Period::new(t0(), t0() + Duration::minutes(1)).unwrap();
        assert!(usage.query_usage(&cancel, period).await.is_err());
    }
}
