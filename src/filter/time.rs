//! Relative time arguments and timestamp handling.

use super::args::{ArgumentError, FilterArgs};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};

/// Timestamp format used by the compute and image APIs
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const TIME_KEYS: [&str; 4] = ["days", "hours", "minutes", "seconds"];

/// An offset into the past, e.g. "3 days and 4 hours ago"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeTime {
    pub days: f64,
    pub hours: f64,
    pub minutes: f64,
    pub seconds: f64,
}

impl RelativeTime {
    /// Parse `{days, hours, minutes, seconds}`; all optional, not all zero
    pub fn from_args(args: &FilterArgs) -> Result<Self, ArgumentError> {
        args.expect_only(&TIME_KEYS)?;
        let time = Self {
            days: args.optional_non_negative("days")?,
            hours: args.optional_non_negative("hours")?,
            minutes: args.optional_non_negative("minutes")?,
            seconds: args.optional_non_negative("seconds")?,
        };
        if time.total_seconds() == 0.0 {
            return Err(ArgumentError::new(
                &TIME_KEYS,
                "requires at least one non-zero time component",
            ));
        }
        Ok(time)
    }

    pub fn total_seconds(&self) -> f64 {
        self.days * 86_400.0 + self.hours * 3_600.0 + self.minutes * 60.0 + self.seconds
    }

    /// `None` when the offset does not fit a [`TimeDelta`]
    pub fn duration(&self) -> Option<TimeDelta> {
        let millis = (self.total_seconds() * 1000.0).round();
        if !millis.is_finite() || millis >= i64::MAX as f64 {
            return None;
        }
        TimeDelta::try_milliseconds(millis as i64)
    }

    /// The instant this offset points at, measured back from `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ArgumentError> {
        self.duration()
            .and_then(|offset| now.checked_sub_signed(offset))
            .ok_or_else(|| ArgumentError::new(&TIME_KEYS, "time offset out of range"))
    }
}

/// Move `instant` onto a whole second, later if `round_up`, earlier otherwise.
/// The flag is false when a sub-second part was dropped.
pub fn whole_second(instant: DateTime<Utc>, round_up: bool) -> (DateTime<Utc>, bool) {
    if instant.timestamp_subsec_nanos() == 0 {
        return (instant, true);
    }
    let secs = instant.timestamp() + i64::from(round_up);
    match DateTime::from_timestamp(secs, 0) {
        Some(rounded) => (rounded, false),
        None => (instant, false),
    }
}

/// Parse a property timestamp; accepts `%Y-%m-%dT%H:%M:%SZ` and RFC 3339
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}
