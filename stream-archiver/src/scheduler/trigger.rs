//! Weekly recurring triggers.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::config::ScheduleEntry;

/// A trigger bound to one schedule entry.
///
/// The trigger is armed for `next_run`. When a poll observes that wall-clock
/// time has reached it, the trigger fires once and re-arms for the following
/// week. A late poll still fires, and a single occurrence never fires twice.
#[derive(Debug, Clone)]
pub struct WeeklyTrigger {
    entry: ScheduleEntry,
    next_run: NaiveDateTime,
}

impl WeeklyTrigger {
    /// Arm a trigger for the first occurrence strictly after `now`.
    pub fn new(entry: ScheduleEntry, now: NaiveDateTime) -> Self {
        let next_run = next_occurrence(entry.day(), entry.time(), now);
        Self { entry, next_run }
    }

    pub fn entry(&self) -> &ScheduleEntry {
        &self.entry
    }

    pub fn next_run(&self) -> NaiveDateTime {
        self.next_run
    }

    /// Returns the occurrence that fired, if `now` has reached it.
    pub fn poll(&mut self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if now < self.next_run {
            return None;
        }
        let fired = self.next_run;
        self.next_run = next_occurrence(self.entry.day(), self.entry.time(), now);
        Some(fired)
    }
}

/// First `day` at `time` (seconds dropped) strictly after `after`.
pub fn next_occurrence(day: Weekday, time: NaiveTime, after: NaiveDateTime) -> NaiveDateTime {
    let time = time
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time);
    let date = after.date();
    let days_ahead = (7 + day.num_days_from_monday() - date.weekday().num_days_from_monday()) % 7;

    let candidate = (date + Duration::days(i64::from(days_ahead))).and_time(time);
    if candidate > after {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}
