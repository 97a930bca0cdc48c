//! Value Objects - Immutable domain primitives with validation
//!
//! Value Objects are:
//! - Immutable
//! - Comparable by value (not identity)
//! - Self-validating
//! - Side-effect free

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DomainError, DomainResult};

/// Grant identifier (Value Object)
///
/// # Invariants
/// - Must be non-empty
/// - Max 128 characters
/// - No whitespace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GrantId(String);

impl GrantId {
    /// Create new grant ID with validation
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(DomainError::InvalidGrantId("cannot be empty".into()));
        }
        if id.len() > 128 {
            return Err(DomainError::InvalidGrantId("max 128 characters".into()));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidGrantId(format!(
                "whitespace not allowed: {:?}",
                id
            )));
        }

        Ok(Self(id))
    }

    /// Get inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GrantId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GrantId> for String {
    fn from(id: GrantId) -> Self {
        id.0
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open time interval `[from, to)` (Value Object)
///
/// # Invariants
/// - `from < to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PeriodBounds")]
pub struct Period {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

#[derive(Deserialize)]
struct PeriodBounds {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl TryFrom<PeriodBounds> for Period {
    type Error = DomainError;

    fn try_from(bounds: PeriodBounds) -> Result<Self, Self::Error> {
        Self::new(bounds.from, bounds.to)
    }
}

impl Period {
    /// Create period with validation
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> DomainResult<Self> {
        if from >= to {
            return Err(DomainError::InvalidPeriod(format!(
                "from {} must be before to {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    /// Inclusive start
    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    /// Exclusive end
    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    /// Length of the period
    pub fn duration(&self) -> Duration {
        self.to - self.from
    }

    /// Check if instant falls in `[from, to)`
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.from <= t && t < self.to
    }

    /// Check if `other` lies wholly inside this period
    pub fn encloses(&self, other: &Period) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    /// Split into `[from, at)` and `[at, to)`; `at` must be strictly inside
    pub fn split_at(&self, at: DateTime<Utc>) -> DomainResult<(Period, Period)> {
        Ok((Period::new(self.from, at)?, Period::new(at, self.to)?))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from.to_rfc3339(), self.to.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_grant_id_valid() {
        let id = GrantId::new("grant-1").unwrap();
        assert_eq!(id.as_str(), "grant-1");
        assert_eq!(id.to_string(), "grant-1");
    }

    #[test]
    fn test_grant_id_empty_fails() {
        assert!(GrantId::new("").is_err());
    }

    #[test]
    fn test_grant_id_whitespace_fails() {
        assert!(GrantId::new("grant 1").is_err());
    }

    #[test]
    fn test_grant_id_too_long_fails() {
        assert!(GrantId::new("g".repeat(129)).is_err());
    }

    #[test]
    fn test_grant_id_serde_validates() {
        let id: GrantId = serde_json::from_str("\"g1\"").unwrap();
        assert_eq!(id.as_str(), "g1");
        assert!(serde_json::from_str::<GrantId>("\"\"").is_err());
    }

    #[test]
    fn test_period_ordering() {
        assert!(Period::new(t(1), t(2)).is_ok());
        assert!(Period::new(t(2), t(2)).is_err());
        assert!(Period::new(t(3), t(2)).is_err());
    }

    #[test]
    fn test_period_half_open() {
        let p = Period::new(t(1), t(2)).unwrap();
        assert!(p.contains(t(1)));
        assert!(!p.contains(t(2)));
        assert_eq!(p.duration(), Duration::hours(1));
    }

    #[test]
    fn test_period_split() {
        let p = Period::new(t(1), t(5)).unwrap();
        let (a, b) = p.split_at(t(3)).unwrap();
        assert_eq!(a, Period::new(t(1), t(3)).unwrap());
        assert_eq!(b, Period::new(t(3), t(5)).unwrap());
        assert!(p.encloses(&a) && p.encloses(&b));

        assert!(p.split_at(t(1)).is_err());
        assert!(p.split_at(t(5)).is_err());
    }

    #[test]
    fn test_period_serde_validates() {
        let p = Period::new(t(1), t(2)).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);

        let inverted = r#"{"from":"2024-01-01T02:00:00Z","to":"2024-01-01T01:00:00Z"}"#;
        assert!(serde_json::from_str::<Period>(inverted).is_err());
    }
}
