//! Simulation calendar — the inclusive date range a run covers.
//!
//! Decisions are keyed by `DayIndex` (offset from `start`), never by the
//! date itself, so moving the range does not perturb unrelated keys.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::types::DayIndex;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimCalendar {
    pub start:         NaiveDate,
    pub end_inclusive: NaiveDate,
}

impl SimCalendar {
    pub fn new(start: NaiveDate, end_inclusive: NaiveDate) -> Self {
        Self { start, end_inclusive }
    }

    /// Number of days in the range. Zero when `end < start`.
    pub fn len(&self) -> u32 {
        let days = (self.end_inclusive - self.start).num_days() + 1;
        days.max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every date in order, paired with its day index.
    pub fn days(&self) -> impl Iterator<Item = (DayIndex, NaiveDate)> {
        let end = self.end_inclusive;
        self.start
            .iter_days()
            .take_while(move |d| *d <= end)
            .enumerate()
            .map(|(i, d)| (i as DayIndex, d))
    }

    /// Day index of `date`, if it falls inside the range.
    pub fn day_index_of(&self, date: NaiveDate) -> Option<DayIndex> {
        if date < self.start || date > self.end_inclusive {
            return None;
        }
        Some((date - self.start).num_days() as DayIndex)
    }

    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
