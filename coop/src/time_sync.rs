//! Building time-set commands from a clock or from operator input.
//!
//! The controller's real-time clock has no notion of time zones: it stores
//! whatever wall-clock reading the host sends, rendered with a `Z` suffix.
//! [`Clock`] selects which wall clock the host reads.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc};
use coop_proto::Command;
use serde::{Deserialize, Serialize};

/// Errors from timestamp parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TimeError {
    /// Field input contained something other than ASCII digits.
    #[error("invalid {field}: {input:?} is not a number")]
    NotANumber {
        /// Field being parsed.
        field: Field,
        /// Offending input.
        input: String,
    },

    /// Field value outside its range.
    #[error("invalid {field}: {value} is outside {min}-{max}")]
    OutOfRange {
        /// Field being checked.
        field: Field,
        /// Offending value.
        value: u32,
        /// Smallest accepted value.
        min: u32,
        /// Largest accepted value.
        max: u32,
    },

    /// Every field is in range but the calendar has no such day.
    #[error("no such date: {year:04}-{month:02}-{day:02}")]
    NoSuchDate {
        /// Year.
        year: i32,
        /// Month, 1-based.
        month: u32,
        /// Day of month, 1-based.
        day: u32,
    },

    /// Text did not match any accepted timestamp layout.
    #[error("unrecognized timestamp {0:?}, expected YYYY-MM-DDTHH:MM:SS")]
    Unparseable(String),

    /// Clock base is neither `local`, `utc` nor an offset.
    #[error("unknown clock {0:?}, expected local, utc or an offset like +01:00")]
    UnknownClock(String),
}

/// A calendar field of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Calendar year.
    Year,
    /// Month of the year.
    Month,
    /// Day of the month.
    Day,
    /// Hour of the day.
    Hour,
    /// Minute of the hour.
    Minute,
    /// Second of the minute.
    Second,
}

impl Field {
    /// All fields, most significant first.
    pub const ALL: [Self; 6] = [
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Hour,
        Self::Minute,
        Self::Second,
    ];

    /// Inclusive range of accepted values.
    pub const fn range(self) -> (u32, u32) {
        match self {
            Self::Year => (0, 9999),
            Self::Month => (1, 12),
            Self::Day => (1, 31),
            Self::Hour => (0, 23),
            Self::Minute | Self::Second => (0, 59),
        }
    }

    /// Lower-case field name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
        }
    }

    /// Checks `value` against [`Field::range`].
    pub fn check(self, value: u32) -> Result<u32, TimeError> {
        let (min, max) = self.range();
        if value < min || value > max {
            return Err(TimeError::OutOfRange {
                field: self,
                value,
                min,
                max,
            });
        }
        Ok(value)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses one field of operator input.
///
/// Empty input (after trimming) means "keep the current value" and yields
/// `None`. Anything but ASCII digits, or a value outside the field's range,
/// is an error.
pub fn parse_field(field: Field, input: &str) -> Result<Option<u32>, TimeError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let not_a_number = || TimeError::NotANumber {
        field,
        input: input.to_owned(),
    };
    if !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_a_number());
    }
    let value: u32 = input.parse().map_err(|_| not_a_number())?;
    field.check(value).map(Some)
}

/// Timestamp fields where `None` keeps the fallback's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartialTimestamp {
    /// Calendar year.
    pub year: Option<u32>,
    /// Month, 1-12.
    pub month: Option<u32>,
    /// Day of month, 1-31.
    pub day: Option<u32>,
    /// Hour, 0-23.
    pub hour: Option<u32>,
    /// Minute, 0-59.
    pub minute: Option<u32>,
    /// Second, 0-59.
    pub second: Option<u32>,
}

impl PartialTimestamp {
    /// Sets one field.
    pub fn set(&mut self, field: Field, value: Option<u32>) {
        match field {
            Field::Year => self.year = value,
            Field::Month => self.month = value,
            Field::Day => self.day = value,
            Field::Hour => self.hour = value,
            Field::Minute => self.minute = value,
            Field::Second => self.second = value,
        }
    }
}

/// Converts a checked year to chrono's signed year.
fn year_of(value: u32) -> Result<i32, TimeError> {
    let (min, max) = Field::Year.range();
    i32::try_from(value).map_err(|_| TimeError::OutOfRange {
        field: Field::Year,
        value,
        min,
        max,
    })
}

/// Combines `parts` with `fallback`, field by field.
///
/// Each missing field independently takes the fallback's value. The result
/// has whole-second precision.
pub fn build_timestamp(
    parts: &PartialTimestamp,
    fallback: NaiveDateTime,
) -> Result<NaiveDateTime, TimeError> {
    let pick = |field: Field, value: Option<u32>, current: u32| match value {
        Some(v) => field.check(v),
        None => Ok(current),
    };
    let year = match parts.year {
        Some(y) => year_of(Field::Year.check(y)?)?,
        None => fallback.year(),
    };
    let month = pick(Field::Month, parts.month, fallback.month())?;
    let day = pick(Field::Day, parts.day, fallback.day())?;
    let hour = pick(Field::Hour, parts.hour, fallback.hour())?;
    let minute = pick(Field::Minute, parts.minute, fallback.minute())?;
    let second = pick(Field::Second, parts.second, fallback.second())?;

    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(TimeError::NoSuchDate { year, month, day })?;
    date.and_hms_opt(hour, minute, second)
        .ok_or(TimeError::OutOfRange {
            field: Field::Second,
            value: second,
            min: 0,
            max: 59,
        })
}

/// Parses a timestamp given on the command line.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS`, optionally suffixed with `Z`, and
/// `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, TimeError> {
    let trimmed = input.trim();
    let text = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .ok_or_else(|| TimeError::Unparseable(input.to_owned()))
}

/// Builds a time-set command, dropping sub-second precision.
pub fn set_time(timestamp: NaiveDateTime) -> Command {
    Command::SetTime {
        timestamp: truncate(timestamp),
    }
}

/// Builds a time-set command from the current reading of `clock`.
pub fn sync_now(clock: &Clock) -> Command {
    set_time(clock.now())
}

/// Wall clock the host reads when synchronizing the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Clock {
    /// The host's local time, daylight saving included.
    #[default]
    Local,
    /// Coordinated universal time.
    Utc,
    /// UTC shifted by a fixed offset, e.g. local standard time all year.
    Fixed(FixedOffset),
}

impl Clock {
    /// Current wall-clock reading, truncated to whole seconds.
    pub fn now(&self) -> NaiveDateTime {
        let now = match self {
            Self::Local => chrono::Local::now().naive_local(),
            Self::Utc => Utc::now().naive_utc(),
            Self::Fixed(offset) => Utc::now().with_timezone(offset).naive_local(),
        };
        truncate(now)
    }
}

impl FromStr for Clock {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" | "z" => Ok(Self::Utc),
            other => parse_offset(other)
                .map(Self::Fixed)
                .ok_or_else(|| TimeError::UnknownClock(s.to_owned())),
        }
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Utc => f.write_str("utc"),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl TryFrom<String> for Clock {
    type Error = TimeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Clock> for String {
    fn from(clock: Clock) -> Self {
        clock.to_string()
    }
}

/// Parses `±HH:MM` or `±HHMM`.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|&c| c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn truncate(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}
