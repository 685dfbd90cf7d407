//! Daily sweep of completed tasks.
//!
//! Polled, not alarmed: the host calls `tick` on a fixed interval and the
//! purge happens on the first tick that sees a later calendar date. A
//! machine asleep across several midnights purges once when it wakes.

use crate::board::Board;
use crate::clock::Clock;
use chrono::NaiveDate;
use tracing::info;

/// Default polling period.
pub const TICK_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollover {
    last_date: NaiveDate,
}

impl Rollover {
    /// Start tracking from the clock's current date.
    pub fn new(clock: &dyn Clock) -> Self {
        Self::starting_at(clock.today())
    }

    pub fn starting_at(last_date: NaiveDate) -> Self {
        Rollover { last_date }
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }

    /// Sweep completed tasks from every category if the date has moved
    /// forward since the previous tick. Returns how many were removed, or
    /// None when the day hasn't changed.
    ///
    /// A date that goes backwards is ignored and not recorded.
    pub fn tick(&mut self, board: &mut Board, clock: &dyn Clock) -> Option<usize> {
        let today = clock.today();
        if today <= self.last_date {
            return None;
        }

        let previous = self.last_date;
        self.last_date = today;

        let before = board.len();
        board.remove_completed_all();
        let removed = before - board.len();

        info!(%previous, %today, removed, revision = board.revision, "day rolled over");
        Some(removed)
    }
}
