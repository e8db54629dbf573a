//! Version stamps
//!
//! A stamp names one pipeline run: `v2026.10.19.14-05`. It is used as the
//! deck file-name suffix, the git tag, and the label shown on the download
//! page. Resolution is one minute.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker character every stamp starts with
pub const STAMP_MARKER: char = 'v';

const STAMP_FORMAT: &str = "v%Y.%m.%d.%H-%M";

/// Regex source matching any stamp, unanchored
pub const STAMP_PATTERN: &str = r"v\d{4}\.\d{2}\.\d{2}\.\d{2}-\d{2}";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid version stamp: {0}")]
pub struct StampParseError(pub String);

/// A minute-resolution version identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionStamp {
    instant: NaiveDateTime,
}

impl VersionStamp {
    /// Stamp for the current local time
    pub fn now() -> Self {
        Self::at(Local::now().naive_local())
    }

    /// Stamp for a given instant. Seconds and below are dropped.
    pub fn at(instant: NaiveDateTime) -> Self {
        let minute = NaiveTime::from_hms_opt(instant.hour(), instant.minute(), 0)
            .unwrap_or(NaiveTime::MIN);
        Self {
            instant: instant.date().and_time(minute),
        }
    }

    pub fn parse(s: &str) -> Result<Self, StampParseError> {
        let invalid = || StampParseError(s.to_string());

        let body = s.strip_prefix(STAMP_MARKER).ok_or_else(invalid)?;
        let (date_part, time_part) = body.rsplit_once('.').ok_or_else(invalid)?;

        let mut date_fields = date_part.splitn(3, '.');
        let mut next_num = |width: usize| -> Result<u32, StampParseError> {
            let field = date_fields.next().ok_or_else(invalid)?;
            if field.len() != width || !field.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            field.parse().map_err(|_| invalid())
        };
        let year = next_num(4)? as i32;
        let month = next_num(2)?;
        let day = next_num(2)?;

        let (hour, minute) = time_part.split_once('-').ok_or_else(invalid)?;
        let two_digits = |f: &str| f.len() == 2 && f.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(hour) || !two_digits(minute) {
            return Err(invalid());
        }
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;

        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)?;
        Ok(Self {
            instant: date.and_time(time),
        })
    }

    /// The instant this stamp encodes, truncated to the minute
    pub fn instant(&self) -> NaiveDateTime {
        self.instant
    }

    /// Seconds since the Unix epoch, treating the stamp as UTC.
    ///
    /// Used for every timestamp written into a deck so that rebuilding
    /// with the same stamp yields identical bytes.
    pub fn epoch_seconds(&self) -> i64 {
        self.instant.and_utc().timestamp()
    }

    /// Regex matching any stamp
    pub fn pattern() -> Regex {
        Regex::new(STAMP_PATTERN).unwrap()
    }
}

impl fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instant.format(STAMP_FORMAT))
    }
}

impl FromStr for VersionStamp {
    type Err = StampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionStamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionStamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
