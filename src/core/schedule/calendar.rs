//! Calendar primitives: the year-month period key, time of day, and the
//! date/hour arithmetic shared by validation, summaries, and prompts.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::core::error::ScheduleError;

/// A year-month scheduling window, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, ScheduleError> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(ScheduleError::Config(format!(
                "period {:04}-{:02} is out of range",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    /// The period a date falls in.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        // year/month are range-checked on construction, day 1 always exists.
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Number of calendar days in the period.
    pub fn days(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Every date of the period in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (1..=self.days()).filter_map(move |d| NaiveDate::from_ymd_opt(self.year, self.month, d))
    }
}

impl FromStr for Period {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ScheduleError::Config(format!("period must be YYYY-MM, got '{}'", s));
        if s.len() != 7 || !s.is_ascii() || s.as_bytes()[4] != b'-' {
            return Err(malformed());
        }
        let (year, month) = (&s[..4], &s[5..]);
        if !year.bytes().all(|b| b.is_ascii_digit()) || !month.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        Period::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Time of day as minutes since midnight. `24:00` is accepted as an end-of-day marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

pub const MINUTES_PER_DAY: u16 = 24 * 60;

impl TimeOfDay {
    pub fn from_hm(hours: u16, minutes: u16) -> Option<Self> {
        let total = hours.checked_mul(60)?.checked_add(minutes)?;
        if minutes >= 60 || total > MINUTES_PER_DAY {
            return None;
        }
        Some(Self(total))
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || format!("time must be HH:MM, got '{}'", s);
        let (h, m) = s.split_once(':').ok_or_else(malformed)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(malformed());
        }
        if !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let hours: u16 = h.parse().map_err(|_| malformed())?;
        let minutes: u16 = m.parse().map_err(|_| malformed())?;
        TimeOfDay::from_hm(hours, minutes).ok_or_else(malformed)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 30,
    }
}

pub fn is_leap_year(year: i32) -> bool {
    year % 400 == 0 || (year % 4 == 0 && year % 100 != 0)
}

/// True when `next` is exactly one calendar day after `prev` within the same year.
///
/// A December 31st to January 1st step is not treated as consecutive; runs are
/// evaluated per period and never span a year change.
pub fn is_consecutive(prev: NaiveDate, next: NaiveDate) -> bool {
    prev.year() == next.year() && prev.succ_opt() == Some(next)
}

/// Worked minutes for one shift, never negative.
pub fn worked_minutes(start: TimeOfDay, end: TimeOfDay, break_minutes: u32) -> u32 {
    let span = i64::from(end.minutes()) - i64::from(start.minutes()) - i64::from(break_minutes);
    span.max(0) as u32
}

pub fn worked_hours(start: TimeOfDay, end: TimeOfDay, break_minutes: u32) -> f64 {
    f64::from(worked_minutes(start, end, break_minutes)) / 60.0
}

/// Rest between a shift ending on one day and a shift starting the next day, in minutes.
pub fn overnight_rest_minutes(prev_end: TimeOfDay, next_start: TimeOfDay) -> u32 {
    u32::from(MINUTES_PER_DAY - prev_end.minutes()) + u32::from(next_start.minutes())
}
