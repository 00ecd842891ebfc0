//! Frozen weeks cannot be edited.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::error::{PlannerError, PlannerResult};
use crate::remote::protocol::FreezeWeek;
use crate::week::Week;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekFreezeGuard {
    frozen: BTreeSet<NaiveDate>,
}

impl WeekFreezeGuard {
    pub fn new(frozen_dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        WeekFreezeGuard {
            frozen: frozen_dates.into_iter().collect(),
        }
    }

    /// Replace the flags for `week` with the dates the backend reported.
    pub fn replace(&mut self, week: Week, frozen_dates: &[NaiveDate]) {
        self.frozen.retain(|d| !week.contains(*d));
        self.frozen
            .extend(frozen_dates.iter().copied().filter(|d| week.contains(*d)));
    }

    pub fn is_date_frozen(&self, date: NaiveDate) -> bool {
        self.frozen.contains(&date)
    }

    /// A week is frozen if any of its dates is.
    pub fn is_week_frozen(&self, week: Week) -> bool {
        self.frozen
            .range(week.start()..week.end_exclusive())
            .next()
            .is_some()
    }

    pub fn ensure_mutable(&self, week: Week) -> PlannerResult<()> {
        if self.is_week_frozen(week) {
            return Err(PlannerError::WeekFrozen(week.start()));
        }
        Ok(())
    }

    /// The request that would move `week` to `frozen`, or `None` if it is
    /// already there.
    pub fn request_toggle(&self, family_id: &str, week: Week, frozen: bool) -> Option<FreezeWeek> {
        if self.is_week_frozen(week) == frozen {
            return None;
        }
        Some(FreezeWeek {
            family_id: family_id.to_string(),
            week_start: week.start(),
            frozen,
        })
    }

    /// Record a confirmed toggle.
    pub fn record(&mut self, week: Week, frozen: bool) {
        if frozen {
            self.frozen.extend(week.days());
        } else {
            self.frozen.retain(|d| !week.contains(*d));
        }
    }
}
