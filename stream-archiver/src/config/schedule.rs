//! Weekly capture schedule entries.

use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A configured weekly recurring capture instruction.
///
/// Entries are validated while the configuration is deserialized, so a loaded
/// entry always carries a real weekday, a real time of day and a positive
/// duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScheduleEntry", into = "RawScheduleEntry")]
pub struct ScheduleEntry {
    url: String,
    name: String,
    duration_minutes: u64,
    day: Weekday,
    time: NaiveTime,
}

impl ScheduleEntry {
    /// Create a schedule entry from its parts.
    pub fn new(
        url: impl Into<String>,
        name: impl Into<String>,
        duration_minutes: u64,
        day: Weekday,
        time: NaiveTime,
    ) -> Result<Self> {
        let entry = Self {
            url: url.into(),
            name: name.into(),
            duration_minutes,
            day,
            time,
        };
        entry.validate()?;
        Ok(entry)
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::config(format!(
                "schedule '{}' has an empty url",
                self.name
            )));
        }
        if self.name.trim().is_empty() {
            return Err(Error::config("schedule name must not be empty"));
        }
        if self.name.contains(['/', '\\']) {
            return Err(Error::config(format!(
                "schedule name '{}' must not contain path separators",
                self.name
            )));
        }
        if self.duration_minutes == 0 {
            return Err(Error::config(format!(
                "schedule '{}' must have a duration of at least one minute",
                self.name
            )));
        }
        Ok(())
    }

    /// Stream locator handed to the capture program.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Job name, used as the output filename prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration_minutes(&self) -> u64 {
        self.duration_minutes
    }

    /// Recording length.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_minutes * 60)
    }

    pub fn day(&self) -> Weekday {
        self.day
    }

    /// Start time of day, truncated to the minute.
    pub fn time(&self) -> NaiveTime {
        self.time
    }
}

/// On-disk representation of a schedule entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawScheduleEntry {
    url: String,
    name: String,
    /// Duration in minutes.
    duration: u64,
    /// Day of week, e.g. "tuesday".
    day: String,
    /// Time of day in HH:MM format.
    time: String,
}

impl TryFrom<RawScheduleEntry> for ScheduleEntry {
    type Error = Error;

    fn try_from(raw: RawScheduleEntry) -> Result<Self> {
        let day = parse_weekday(&raw.day)?;
        let time = parse_time_of_day(&raw.time)?;
        ScheduleEntry::new(raw.url, raw.name, raw.duration, day, time)
    }
}

impl From<ScheduleEntry> for RawScheduleEntry {
    fn from(entry: ScheduleEntry) -> Self {
        Self {
            url: entry.url,
            name: entry.name,
            duration: entry.duration_minutes,
            day: weekday_to_string(entry.day).to_lowercase(),
            time: entry.time.format("%H:%M").to_string(),
        }
    }
}

/// Parse an English weekday name ("tuesday", "Tue", ...).
pub fn parse_weekday(s: &str) -> Result<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| Error::config(format!("invalid day of week: '{}'", s)))
}

/// Parse a time of day in `HH:MM` format.
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| Error::config(format!("invalid time '{}', expected HH:MM", s)))
}

pub fn weekday_to_string(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
