//! Usage query granularity
//!
//! The usage backend aggregates measurements into fixed windows aligned to the
//! Unix epoch. Anything that slices usage by time has to cut on those window
//! edges or it double-counts (or drops) the usage of a partially covered window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Window size of the usage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowSize {
    /// One minute windows
    #[default]
    Minute,
    /// One hour windows
    Hour,
    /// One day windows (UTC)
    Day,
}

impl WindowSize {
    /// Window length in seconds
    pub const fn seconds(&self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    /// Window length
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds())
    }

    /// Check if instant sits exactly on a window edge
    pub fn is_aligned(&self, t: DateTime<Utc>) -> bool {
        t.timestamp_subsec_nanos() == 0 && t.timestamp().rem_euclid(self.seconds()) == 0
    }

    /// Latest window edge at or before `t`
    pub fn align_down(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let offset = Duration::seconds(t.timestamp().rem_euclid(self.seconds()))
            + Duration::nanoseconds(i64::from(t.timestamp_subsec_nanos()));
        t.checked_sub_signed(offset)
    }

    /// Earliest window edge at or after `t`
    pub fn align_up(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_aligned(t) {
            return Some(t);
        }
        self.align_down(t)?.checked_add_signed(self.duration())
    }
}

impl FromStr for WindowSize {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MINUTE" => Ok(Self::Minute),
            "HOUR" => Ok(Self::Hour),
            "DAY" => Ok(Self::Day),
            _ => Err(DomainError::UnsupportedWindowSize(s.to_string())),
        }
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minute => write!(f, "MINUTE"),
            Self::Hour => write!(f, "HOUR"),
            Self::Day => write!(f, "DAY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_alignment() {
        let edge = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let inside = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 30).unwrap();

        assert!(WindowSize::Minute.is_aligned(edge));
        assert!(WindowSize::Hour.is_aligned(edge));
        assert!(!WindowSize::Day.is_aligned(edge));
        assert!(!WindowSize::Minute.is_aligned(inside));
    }

    #[test]
    fn test_align_up_and_down() {
        let inside = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 30).unwrap();

        assert_eq!(
            WindowSize::Minute.align_down(inside),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).single()
        );
        assert_eq!(
            WindowSize::Minute.align_up(inside),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 1, 0).single()
        );
        assert_eq!(
            WindowSize::Day.align_up(inside),
            Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).single()
        );
    }

    #[test]
    fn test_align_up_is_identity_on_edges() {
        let edge = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(WindowSize::Day.align_up(edge), Some(edge));
        assert_eq!(WindowSize::Day.align_down(edge), Some(edge));
    }

    #[test]
    fn test_sub_second_instants() {
        let edge = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let just_after = edge + Duration::milliseconds(1);

        assert!(!WindowSize::Minute.is_aligned(just_after));
        assert_eq!(WindowSize::Minute.align_down(just_after), Some(edge));
        assert_eq!(
            WindowSize::Minute.align_up(just_after),
            Some(edge + Duration::minutes(1))
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("hour".parse::<WindowSize>().unwrap(), WindowSize::Hour);
        assert_eq!("DAY".parse::<WindowSize>().unwrap(), WindowSize::Day);
        assert!("fortnight".parse::<WindowSize>().is_err());
        assert_eq!(WindowSize::default(), WindowSize::Minute);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&WindowSize::Hour).unwrap(), "\"HOUR\"");
        let w: WindowSize = serde_json::from_str("\"MINUTE\"").unwrap();
        assert_eq!(w, WindowSize::Minute);
    }
}
