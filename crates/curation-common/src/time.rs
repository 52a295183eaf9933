//! Temporal windows for matching labels against scene archives.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CurationError;

/// Symmetric-or-not tolerance around a label timestamp, in whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateAllowance {
    pub pre_days: i64,
    pub post_days: i64,
}

impl DateAllowance {
    pub fn new(pre_days: i64, post_days: i64) -> Result<Self, CurationError> {
        let allowance = DateAllowance {
            pre_days,
            post_days,
        };
        allowance.validate()?;
        Ok(allowance)
    }

    /// Negative day counts are a configuration error, not a reversed window.
    pub fn validate(&self) -> Result<(), CurationError> {
        if self.pre_days < 0 || self.post_days < 0 {
            return Err(CurationError::InvalidDateAllowance {
                pre_days: self.pre_days,
                post_days: self.post_days,
            });
        }
        Ok(())
    }

    /// Exact-date matching only.
    pub fn exact() -> Self {
        DateAllowance {
            pre_days: 0,
            post_days: 0,
        }
    }
}

impl Default for DateAllowance {
    fn default() -> Self {
        DateAllowance::exact()
    }
}

/// Inclusive date range queried against a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

impl QueryWindow {
    /// Expand a label date by its allowance. Both endpoints are inclusive,
    /// so a zero allowance yields a single-day window.
    pub fn from_allowance(date: NaiveDate, allowance: &DateAllowance) -> Result<Self, CurationError> {
        allowance.validate()?;
        Ok(QueryWindow {
            date_start: date - Duration::days(allowance.pre_days),
            date_end: date + Duration::days(allowance.post_days),
        })
    }

    pub fn single_day(date: NaiveDate) -> Self {
        QueryWindow {
            date_start: date,
            date_end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.date_start && date <= self.date_end
    }

    /// Days between a date and the window's anchor-free span, used when
    /// ranking candidate scenes by distance from the label date.
    pub fn span_days(&self) -> i64 {
        (self.date_end - self.date_start).num_days() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_allowance_rejects_negative_days() {
        assert!(DateAllowance::new(-1, 0).is_err());
        assert!(DateAllowance::new(0, -3).is_err());
        assert!(DateAllowance::new(0, 0).is_ok());
        assert!(DateAllowance::new(5, 10).is_ok());
    }

    #[test]
    fn test_window_from_allowance() {
        let allowance = DateAllowance::new(2, 3).unwrap();
        let window = QueryWindow::from_allowance(d("2024-08-26"), &allowance).unwrap();
        assert_eq!(window.date_start, d("2024-08-24"));
        assert_eq!(window.date_end, d("2024-08-29"));
        assert_eq!(window.span_days(), 6);
    }

    #[test]
    fn test_zero_allowance_is_single_day() {
        let window =
            QueryWindow::from_allowance(d("2024-08-26"), &DateAllowance::exact()).unwrap();
        assert_eq!(window, QueryWindow::single_day(d("2024-08-26")));
        assert!(window.contains(d("2024-08-26")));
        assert!(!window.contains(d("2024-08-27")));
        assert_eq!(window.span_days(), 1);
    }

    #[test]
    fn test_window_contains_is_inclusive_both_ends() {
        let window = QueryWindow {
            date_start: d("2024-01-10"),
            date_end: d("2024-01-20"),
        };
        assert!(window.contains(d("2024-01-10")));
        assert!(window.contains(d("2024-01-20")));
        assert!(!window.contains(d("2024-01-09")));
        assert!(!window.contains(d("2024-01-21")));
    }

    #[test]
    fn test_window_crosses_month_boundary() {
        let allowance = DateAllowance::new(3, 3).unwrap();
        let window = QueryWindow::from_allowance(d("2024-03-01"), &allowance).unwrap();
        assert_eq!(window.date_start, d("2024-02-27"));
        assert_eq!(window.date_end, d("2024-03-04"));
    }
}
