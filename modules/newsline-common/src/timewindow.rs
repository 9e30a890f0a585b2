//! Deterministic time-window resolution for news retrieval.
//!
//! `Precision` and `Digest` encode a fixed five-slot daily publishing
//! cadence aligned to the digest delivery schedule. The slot boundaries
//! are deliberately asymmetric and must stay bit-exact: they mirror an
//! external business schedule, they are not derived from anything.

use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimeWindowError {
    #[error("Unknown time mode: {0}")]
    UnknownMode(String),

    #[error("Start date is required for whole mode")]
    MissingStartDate,
}

/// Retrieval mode for the time-window query surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    /// Explicit calendar range, whole days.
    Whole,
    /// Trailing 24 hours, aligned to the hour.
    Last24,
    /// From the previous digest boundary up to the current minute.
    Precision,
    /// The full bucket of the previous digest slot.
    Digest,
}

impl FromStr for TimeMode {
    type Err = TimeWindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whole" => Ok(TimeMode::Whole),
            "last24" => Ok(TimeMode::Last24),
            "precision" => Ok(TimeMode::Precision),
            "digest" => Ok(TimeMode::Digest),
            other => Err(TimeWindowError::UnknownMode(other.to_string())),
        }
    }
}

impl TimeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeMode::Whole => "whole",
            TimeMode::Last24 => "last24",
            TimeMode::Precision => "precision",
            TimeMode::Digest => "digest",
        }
    }
}

/// Five-slot partition of the day by hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayPart {
    Night,     // [00, 08)
    Morning,   // [08, 13)
    Afternoon, // [13, 18)
    Evening,   // [18, 22)
    LateNight, // [22, 24)
}

fn day_part(now: NaiveDateTime) -> DayPart {
    match now.hour() {
        0..=7 => DayPart::Night,
        8..=12 => DayPart::Morning,
        13..=17 => DayPart::Afternoon,
        18..=21 => DayPart::Evening,
        _ => DayPart::LateNight,
    }
}

/// Wall-clock constructor for statically valid times.
fn at(date: NaiveDate, hour: u32, min: u32, sec: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, min, sec)
        .expect("valid wall-clock time")
}

/// Resolve a retrieval mode to a concrete `[start, end]` interval.
///
/// Pure and deterministic for a fixed `now`. All times are naive; no
/// timezone conversion happens anywhere in the resolver.
pub fn resolve_window(
    mode: TimeMode,
    now: NaiveDateTime,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<(NaiveDateTime, NaiveDateTime), TimeWindowError> {
    match mode {
        TimeMode::Whole => {
            let start_date = start_date.ok_or(TimeWindowError::MissingStartDate)?;
            let start = at(start_date, 0, 0, 0);
            let end = at(end_date.unwrap_or(start_date), 23, 59, 59);
            Ok((start, end))
        }
        TimeMode::Last24 => {
            let end = at(now.date(), now.hour(), 0, 0);
            Ok((end - Duration::hours(24), end))
        }
        TimeMode::Precision => {
            let end = at(now.date(), now.hour(), now.minute(), 0);
            let start = match day_part(now) {
                DayPart::Night | DayPart::Morning => at(now.date() - Duration::days(1), 21, 56, 0),
                DayPart::Afternoon => at(now.date(), 8, 56, 0),
                DayPart::Evening => at(now.date(), 12, 56, 0),
                DayPart::LateNight => at(now.date(), 17, 56, 0),
            };
            Ok((start, end))
        }
        TimeMode::Digest => {
            let today = now.date();
            let yesterday = today - Duration::days(1);
            // Each bucket ends one second before the next bucket starts.
            let (start, end) = match day_part(now) {
                DayPart::Night => (at(yesterday, 17, 56, 0), at(yesterday, 21, 55, 59)),
                DayPart::Morning => (at(yesterday, 21, 56, 0), at(today, 8, 55, 59)),
                DayPart::Afternoon => (at(today, 8, 56, 0), at(today, 12, 55, 59)),
                DayPart::Evening => (at(today, 12, 56, 0), at(today, 17, 55, 59)),
                DayPart::LateNight => (at(today, 17, 56, 0), at(today, 21, 55, 59)),
            };
            Ok((start, end))
        }
    }
}
