//! Common types used across the platform

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inclusive range of whole days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Rejected report or listing bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DateRangeError {
    #[error("End date precedes start date")]
    Inverted,

    #[error("End date is out of range")]
    OutOfRange,
}

impl DateRange {
    /// `end` must not precede `start`, and the day after `end` must exist
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Inverted);
        }
        if end.succ_opt().is_none() {
            return Err(DateRangeError::OutOfRange);
        }
        Ok(Self { start, end })
    }

    /// First through last day of the month containing `today`
    pub fn month_of(today: NaiveDate) -> Self {
        let start = today.with_day(1).unwrap_or(today);
        let next_month = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        let end = next_month
            .and_then(|d| d.pred_opt())
            .unwrap_or(today);
        Self { start, end }
    }

    /// Resolve optional request bounds, defaulting to the month of `today`.
    /// A single bound is paired with the matching edge of that month.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, DateRangeError> {
        let month = Self::month_of(today);
        Self::new(start.unwrap_or(month.start), end.unwrap_or(month.end))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Start of the first day (00:00:00 UTC)
    pub fn start_of_day(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Exclusive upper bound: 00:00:00 UTC of the day after `end`,
    /// saturating at the last representable instant
    pub fn end_exclusive(&self) -> DateTime<Utc> {
        self.end
            .succ_opt()
            .map_or(NaiveDateTime::MAX, |next| next.and_time(NaiveTime::MIN))
            .and_utc()
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_bounds() {
        let r = DateRange::month_of(date(2024, 2, 17));
        assert_eq!(r.start, date(2024, 2, 1));
        assert_eq!(r.end, date(2024, 2, 29));

        let r = DateRange::month_of(date(2023, 12, 31));
        assert_eq!(r.start, date(2023, 12, 1));
        assert_eq!(r.end, date(2023, 12, 31));
    }

    #[test]
    fn resolve_defaults_and_rejects_inverted() {
        let today = date(2024, 5, 10);
        assert_eq!(
            DateRange::resolve(None, None, today),
            Ok(DateRange::month_of(today))
        );
        assert_eq!(
            DateRange::resolve(Some(date(2024, 5, 3)), Some(date(2024, 5, 3)), today).map(|r| r.days()),
            Ok(1)
        );
        assert_eq!(
            DateRange::resolve(Some(date(2024, 6, 1)), Some(date(2024, 5, 1)), today),
            Err(DateRangeError::Inverted)
        );
    }

    #[test]
    fn last_calendar_day_is_rejected_as_end() {
        let today = date(2024, 5, 10);
        assert_eq!(
            DateRange::resolve(None, Some(NaiveDate::MAX), today),
            Err(DateRangeError::OutOfRange)
        );
        let last_usable = NaiveDate::MAX.pred_opt().unwrap();
        let r = DateRange::new(date(2024, 1, 1), last_usable).unwrap();
        assert_eq!(r.end_exclusive(), NaiveDate::MAX.and_time(NaiveTime::MIN).and_utc());

        // Built directly, bypassing `new`
        let raw = DateRange { start: date(2024, 1, 1), end: NaiveDate::MAX };
        assert_eq!(raw.end_exclusive(), NaiveDateTime::MAX.and_utc());
    }

    #[test]
    fn window_covers_whole_days() {
        let r = DateRange::new(date(2024, 5, 1), date(2024, 5, 2)).unwrap();
        assert_eq!(r.start_of_day().to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert_eq!(r.end_exclusive().to_rfc3339(), "2024-05-03T00:00:00+00:00");
        assert!(r.contains(date(2024, 5, 2)));
        assert!(!r.contains(date(2024, 5, 3)));
    }
}
