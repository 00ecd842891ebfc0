//! Monday-start weeks shown by the planner grid.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, PlannerResult};

pub const DAYS_PER_WEEK: usize = 7;

/// A 7-day span identified by its Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Week {
    start: NaiveDate,
}

impl Week {
    /// The week that contains `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday() as i64;
        Week {
            start: date - Duration::days(offset),
        }
    }

    /// The week containing today in the family's timezone.
    pub fn current(tz: Tz) -> Self {
        Self::containing(Utc::now().with_timezone(&tz).date_naive())
    }

    /// Parse a week argument.
    /// - `None` or "this": the current week
    /// - "next" / "prev": relative to the current week
    /// - YYYY-MM-DD: the week containing that date
    pub fn from_arg(arg: Option<&str>, tz: Tz) -> PlannerResult<Self> {
        let current = Self::current(tz);
        match arg {
            None | Some("this") => Ok(current),
            Some("next") => Ok(current.next()),
            Some("prev") | Some("last") => Ok(current.previous()),
            Some(s) => {
                let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                    PlannerError::Validation(format!(
                        "Invalid week '{}'. Expected YYYY-MM-DD, this, next or prev",
                        s
                    ))
                })?;
                Ok(Self::containing(date))
            }
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// First day after the week (exclusive fetch bound).
    pub fn end_exclusive(&self) -> NaiveDate {
        self.start + Duration::days(DAYS_PER_WEEK as i64)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..DAYS_PER_WEEK as i64).map(move |i| self.start + Duration::days(i))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end_exclusive()
    }

    pub fn next(&self) -> Self {
        Week {
            start: self.start + Duration::days(DAYS_PER_WEEK as i64),
        }
    }

    pub fn previous(&self) -> Self {
        Week {
            start: self.start - Duration::days(DAYS_PER_WEEK as i64),
        }
    }
}

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn snaps_to_monday() {
        // 2025-03-20 is a Thursday
        let week = Week::containing(date(2025, 3, 20));
        assert_eq!(week.start(), date(2025, 3, 17));

        // Sunday belongs to the week that started six days earlier
        let week = Week::containing(date(2025, 3, 23));
        assert_eq!(week.start(), date(2025, 3, 17));
    }

    #[test]
    fn days_and_bounds() {
        let week = Week::containing(date(2025, 3, 17));
        let days: Vec<_> = week.days().collect();

        assert_eq!(days.len(), 7);
        assert_eq!(days[6], date(2025, 3, 23));
        assert_eq!(week.end_exclusive(), date(2025, 3, 24));
        assert!(week.contains(date(2025, 3, 23)));
        assert!(!week.contains(date(2025, 3, 24)));
    }

    #[test]
    fn navigation_crosses_month_boundaries() {
        let week = Week::containing(date(2025, 3, 31));
        assert_eq!(week.next().start(), date(2025, 4, 7));
        assert_eq!(week.previous().start(), date(2025, 3, 24));
    }

    #[test]
    fn parses_explicit_date_argument() {
        let week = Week::from_arg(Some("2025-03-20"), chrono_tz::UTC).unwrap();
        assert_eq!(week.start(), date(2025, 3, 17));

        let err = Week::from_arg(Some("20/03/2025"), chrono_tz::UTC).unwrap_err();
        assert!(matches!(err, PlannerError::Validation(_)));
    }
}
