//! Calendar source.
//!
//! Everything that needs "today" takes a `&dyn Clock` so tests can move
//! the date forward without waiting on the wall clock.

use chrono::{Days, Local, NaiveDate};
use std::cell::Cell;

pub trait Clock {
    /// Current local calendar date (no time component).
    fn today(&self) -> NaiveDate;
}

/// The host's local calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    date: Cell<NaiveDate>,
}

impl ManualClock {
    pub fn new(date: NaiveDate) -> Self {
        ManualClock { date: Cell::new(date) }
    }

    pub fn set(&self, date: NaiveDate) {
        self.date.set(date);
    }

    /// Saturates at the calendar's upper bound.
    pub fn advance_days(&self, days: u64) {
        let current = self.date.get();
        self.date.set(current.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX));
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        self.date.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());

        clock.set(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }
}
