//! Recurrence Resolver
//!
//! A recurrence is a schedule definition: an anchor instant plus an interval.
//! Occurrence `n` is reached by stepping `n` intervals from the anchor
//! (negative `n` steps backward). Days and weeks are fixed lengths in UTC.
//! Months and years are calendar steps; a step landing past the end of a
//! month clamps to its last day and later steps keep the clamped day, so an
//! anchor on Jan 31 recurs on Feb 29, then Mar 29.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BurnDownError, Result};

/// Recurrence interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecurrenceInterval {
    /// Every 24 hours
    Day,
    /// Every 7 days
    Week,
    /// Every calendar month
    Month,
    /// Every calendar year
    Year,
}

impl FromStr for RecurrenceInterval {
    type Err = BurnDownError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DAY" | "DAILY" => Ok(Self::Day),
            "WEEK" | "WEEKLY" => Ok(Self::Week),
            "MONTH" | "MONTHLY" => Ok(Self::Month),
            "YEAR" | "YEARLY" => Ok(Self::Year),
            _ => Err(BurnDownError::UnsupportedRecurrenceInterval(s.to_string())),
        }
    }
}

impl TryFrom<String> for RecurrenceInterval {
    type Error = BurnDownError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecurrenceInterval> for String {
    fn from(interval: RecurrenceInterval) -> Self {
        interval.to_string()
    }
}

impl fmt::Display for RecurrenceInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "DAY"),
            Self::Week => write!(f, "WEEK"),
            Self::Month => write!(f, "MONTH"),
            Self::Year => write!(f, "YEAR"),
        }
    }
}

/// Anchored recurring schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recurrence {
    /// Step between occurrences
    pub interval: RecurrenceInterval,
    /// Reference occurrence
    pub anchor: DateTime<Utc>,
}

impl Recurrence {
    /// Create recurrence
    pub fn new(interval: RecurrenceInterval, anchor: DateTime<Utc>) -> Self {
        Self { interval, anchor }
    }

    /// Earliest occurrence at or after `t`
    pub fn next_after(&self, t: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.first_index_at_or_after(t).map(|(_, at)| at)
    }

    /// Latest occurrence strictly before `t`
    pub fn prev_before(&self, t: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let (n, _) = self.first_index_at_or_after(t)?;
        self.occurrence(n - 1)
    }

    /// Occurrences in ascending order starting with the first at or after `t`
    pub fn occurrences_from(&self, t: DateTime<Utc>) -> Result<Occurrences> {
        let (n, _) = self.first_index_at_or_after(t)?;
        Ok(Occurrences {
            recurrence: *self,
            next: n,
        })
    }

    /// The anchor stepped `n` intervals
    pub fn occurrence(&self, n: i64) -> Result<DateTime<Utc>> {
        let at = match self.interval {
            RecurrenceInterval::Day => Duration::try_days(n)
                .and_then(|d| self.anchor.checked_add_signed(d)),
            RecurrenceInterval::Week => Duration::try_weeks(n)
                .and_then(|d| self.anchor.checked_add_signed(d)),
            RecurrenceInterval::Month => self.step_months(n, 1),
            RecurrenceInterval::Year => self.step_months(n, 12),
        };

        at.ok_or_else(|| {
            BurnDownError::RecurrenceOutOfRange(format!(
                "occurrence {} of {} recurrence anchored at {}",
                n, self.interval, self.anchor
            ))
        })
    }

    /// `n` steps of `step` calendar months from the anchor
    ///
    /// Each step clamps the day to the month it lands in, so the day of
    /// occurrence `n` is the smallest month length met on the way. Any 48
    /// consecutive months contain a 28-day February, so only that many steps
    /// can lower the day.
    fn step_months(&self, n: i64, step: i64) -> Option<DateTime<Utc>> {
        let start = i64::from(self.anchor.year()) * 12 + i64::from(self.anchor.month0());
        let month_at = |k: i64| -> Option<(i32, u32)> {
            let total = start.checked_add(k.checked_mul(step)?)?;
            let year = i32::try_from(total.div_euclid(12)).ok()?;
            Some((year, total.rem_euclid(12) as u32 + 1))
        };

        let mut day = self.anchor.day();
        let direction = n.signum();
        for k in 1..=n.unsigned_abs().min((48 / step) as u64) as i64 {
            let (year, month) = month_at(k * direction)?;
            day = day.min(days_in_month(year, month)?);
        }

        let (year, month) = month_at(n)?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some(date.and_time(self.anchor.time()).and_utc())
    }

    /// Index estimate, off from the true answer by at most a step or two
    fn estimate_index(&self, t: DateTime<Utc>) -> i64 {
        match self.interval {
            RecurrenceInterval::Day => (t - self.anchor).num_seconds().div_euclid(86_400),
            RecurrenceInterval::Week => (t - self.anchor).num_seconds().div_euclid(604_800),
            RecurrenceInterval::Month => {
                i64::from(t.year() - self.anchor.year()) * 12
                    + (i64::from(t.month()) - i64::from(self.anchor.month()))
            }
            RecurrenceInterval::Year => i64::from(t.year() - self.anchor.year()),
        }
    }

    /// Smallest `n` whose occurrence is `>= t`, with that occurrence
    fn first_index_at_or_after(&self, t: DateTime<Utc>) -> Result<(i64, DateTime<Utc>)> {
        let mut n = self.estimate_index(t);
        let mut at = self.occurrence(n)?;

        while at < t {
            n += 1;
            at = self.occurrence(n)?;
        }
        loop {
            let prev = self.occurrence(n - 1)?;
            if prev < t {
                break;
            }
            n -= 1;
            at = prev;
        }

        Ok((n, at))
    }
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year.checked_add(1)?, 1) } else { (year, month + 1) };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_of_next.pred_opt()?.day())
}

/// Ascending occurrence iterator
#[derive(Debug, Clone)]
pub struct Occurrences {
    recurrence: Recurrence,
    next: i64,
}

impl Iterator for Occurrences {
    type Item = Result<DateTime<Utc>>;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.recurrence.occurrence(self.next);
        self.next = self.next.checked_add(1)?;
        Some(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_next_after_is_inclusive() {
        let r = Recurrence::new(RecurrenceInterval::Day, at(2024, 1, 1, 0));
        assert_eq!(r.next_after(at(2024, 1, 1, 0)).unwrap(), at(2024, 1, 1, 0));
        assert_eq!(r.next_after(at(2024, 1, 5, 0)).unwrap(), at(2024, 1, 5, 0));
        assert_eq!(r.next_after(at(2024, 1, 5, 1)).unwrap(), at(2024, 1, 6, 0));
    }

    #[test]
    fn test_prev_before_is_exclusive() {
        let r = Recurrence::new(RecurrenceInterval::Day, at(2024, 1, 1, 0));
        assert_eq!(r.prev_before(at(2024, 1, 5, 0)).unwrap(), at(2024, 1, 4, 0));
        assert_eq!(r.prev_before(at(2024, 1, 5, 1)).unwrap(), at(2024, 1, 5, 0));
    }

    #[test]
    fn test_anchor_after_target_steps_backward() {
        let r = Recurrence::new(RecurrenceInterval::Week, at(2024, 3, 1, 12));
        assert_eq!(r.next_after(at(2024, 2, 20, 0)).unwrap(), at(2024, 2, 23, 12));
        assert_eq!(r.prev_before(at(2024, 2, 20, 0)).unwrap(), at(2024, 2, 16, 12));
    }

    #[test]
    fn test_monthly_clamp_carries_forward() {
        let r = Recurrence::new(RecurrenceInterval::Month, at(2024, 1, 31, 0));
        assert_eq!(r.next_after(at(2024, 2, 1, 0)).unwrap(), at(2024, 2, 29, 0));
        assert_eq!(r.next_after(at(2024, 3, 1, 0)).unwrap(), at(2024, 3, 29, 0));
        assert_eq!(r.next_after(at(2024, 4, 1, 0)).unwrap(), at(2024, 4, 29, 0));
        assert_eq!(r.next_after(at(2025, 3, 1, 0)).unwrap(), at(2025, 3, 28, 0));
    }

    #[test]
    fn test_monthly_clamp_backward() {
        let r = Recurrence::new(RecurrenceInterval::Month, at(2024, 1, 31, 0));
        assert_eq!(r.prev_before(at(2024, 1, 15, 0)).unwrap(), at(2023, 12, 31, 0));
        assert_eq!(r.prev_before(at(2023, 12, 1, 0)).unwrap(), at(2023, 11, 30, 0));
        assert_eq!(r.prev_before(at(2023, 11, 1, 0)).unwrap(), at(2023, 10, 30, 0));
    }

    #[test]
    fn test_calendar_steps_match_one_at_a_time() {
        let anchor = at(2020, 8, 31, 6);
        let r = Recurrence::new(RecurrenceInterval::Month, anchor);

        let mut stepped = anchor;
        for n in 1..=70 {
            // chrono clamps a single month step to the target month's end
            stepped = stepped
                .date_naive()
                .checked_add_months(chrono::Months::new(1))
                .unwrap()
                .and_time(anchor.time())
                .and_utc();
            assert_eq!(r.occurrence(n).unwrap(), stepped, "step {n}");
        }
    }

    #[test]
    fn test_yearly_leap_day() {
        let r = Recurrence::new(RecurrenceInterval::Year, at(2024, 2, 29, 0));
        assert_eq!(r.next_after(at(2024, 3, 1, 0)).unwrap(), at(2025, 2, 28, 0));
        assert_eq!(r.next_after(at(2027, 3, 1, 0)).unwrap(), at(2028, 2, 28, 0));
        assert_eq!(r.prev_before(at(2024, 1, 1, 0)).unwrap(), at(2023, 2, 28, 0));
    }

    #[test]
    fn test_time_of_day_is_kept() {
        let r = Recurrence::new(RecurrenceInterval::Month, at(2024, 1, 15, 18));
        assert_eq!(r.next_after(at(2024, 6, 15, 19)).unwrap(), at(2024, 7, 15, 18));
        assert_eq!(r.next_after(at(2024, 6, 15, 17)).unwrap(), at(2024, 6, 15, 18));
    }

    #[test]
    fn test_distant_anchor_matches_stepping() {
        let anchor = at(2001, 3, 7, 5);
        let r = Recurrence::new(RecurrenceInterval::Day, anchor);
        let target = at(2024, 8, 1, 3);

        let mut stepped = anchor;
        while stepped < target {
            stepped += Duration::days(1);
        }
        assert_eq!(r.next_after(target).unwrap(), stepped);
        assert_eq!(r.prev_before(target).unwrap(), stepped - Duration::days(1));
    }

    #[test]
    fn test_occurrences_iterate_forward() {
        let r = Recurrence::new(RecurrenceInterval::Month, at(2024, 1, 31, 0));
        let got: Vec<_> = r
            .occurrences_from(at(2024, 1, 1, 0))
            .unwrap()
            .take(3)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(got, vec![at(2024, 1, 31, 0), at(2024, 2, 29, 0), at(2024, 3, 29, 0)]);
    }

    #[test]
    fn test_interval_parse() {
        assert_eq!("daily".parse::<RecurrenceInterval>().unwrap(), RecurrenceInterval::Day);
        assert_eq!("MONTH".parse::<RecurrenceInterval>().unwrap(), RecurrenceInterval::Month);
        assert!(matches!(
            "HOURLY".parse::<RecurrenceInterval>(),
            Err(BurnDownError::UnsupportedRecurrenceInterval(s)) if s == "HOURLY"
        ));
    }

    #[test]
    fn test_interval_serde_rejects_unknown() {
        let json = r#"{"interval":"WEEK","anchor":"2024-01-01T00:00:00Z"}"#;
        let r: Recurrence = serde_json::from_str(json).unwrap();
        assert_eq!(r.interval, RecurrenceInterval::Week);

        let bad = r#"{"interval":"FORTNIGHT","anchor":"2024-01-01T00:00:00Z"}"#;
        let err = serde_json::from_str::<Recurrence>(bad).unwrap_err();
        assert!(err.to_string().contains("FORTNIGHT"));
    }
}
