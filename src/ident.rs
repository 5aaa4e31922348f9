//! Record identifiers
//!
//! Text form:
//! ```text
//! ordinal-key-partition-HH:MM:SS_AMPM-DD_MM_YYYY-rand
//! 7-notes-journal-10:30:05_AM-04_06_2024-x9Qa
//! ```
//!
//! The time, date and suffix segments never contain `-`. The key and
//! partition segments have any `-` rewritten to `_` when the identifier is
//! generated, so the text form always splits into exactly six segments.

use crate::defaults::{DEFAULT_KEY, DEFAULT_PARTITION, ID_SEPARATOR, RANDOM_SUFFIX_LEN};
use chrono::{Datelike, NaiveDateTime, Timelike};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseIdError {
    #[error("Expected 6 identifier segments, found {0}")]
    SegmentCount(usize),

    #[error("Invalid ordinal {0:?}")]
    Ordinal(String),

    #[error("Invalid time {0:?}")]
    Time(String),

    #[error("Invalid date {0:?}")]
    Date(String),
}

/// Half of the 12-hour clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Meridiem::Am => "AM",
            Meridiem::Pm => "PM",
        }
    }
}

impl FromStr for Meridiem {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Meridiem::Am),
            "PM" => Ok(Meridiem::Pm),
            _ => Err(()),
        }
    }
}

/// Time of insertion on the 12-hour clock (`10:30:05_AM`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub meridiem: Meridiem,
}

impl ClockTime {
    pub fn from_datetime(at: &NaiveDateTime) -> Self {
        let (pm, hour) = at.hour12();
        Self {
            hour: hour as u8,
            minute: at.minute() as u8,
            second: at.second() as u8,
            meridiem: if pm { Meridiem::Pm } else { Meridiem::Am },
        }
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}_{}",
            self.hour,
            self.minute,
            self.second,
            self.meridiem.as_str()
        )
    }
}

impl FromStr for ClockTime {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError::Time(s.to_string());
        let (clock, meridiem) = s.split_once('_').ok_or_else(err)?;
        let meridiem = meridiem.parse::<Meridiem>().map_err(|_| err())?;

        let parts: Vec<u8> = clock
            .split(':')
            .map(|p| p.parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| err())?;
        let [hour, minute, second] = parts[..] else {
            return Err(err());
        };
        if !(1..=12).contains(&hour) || minute > 59 || second > 59 {
            return Err(err());
        }

        Ok(Self {
            hour,
            minute,
            second,
            meridiem,
        })
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

/// Date of insertion (`04_06_2024`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDate {
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl CalendarDate {
    pub fn from_datetime(at: &NaiveDateTime) -> Self {
        Self {
            day: at.day() as u8,
            month: at.month() as u8,
            year: at.year().clamp(0, 9999) as u16,
        }
    }

    /// Compact form used in dated partition names (`04062024`)
    pub fn compact(&self) -> String {
        format!("{:02}{:02}{:04}", self.day, self.month, self.year)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}_{:02}_{:04}", self.day, self.month, self.year)
    }
}

impl FromStr for CalendarDate {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError::Date(s.to_string());
        let parts: Vec<u16> = s
            .split('_')
            .map(|p| p.parse::<u16>())
            .collect::<Result<_, _>>()
            .map_err(|_| err())?;
        let [day, month, year] = parts[..] else {
            return Err(err());
        };
        if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
            return Err(err());
        }

        Ok(Self {
            day: day as u8,
            month: month as u8,
            year,
        })
    }
}

impl TryFrom<String> for CalendarDate {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CalendarDate> for String {
    fn from(value: CalendarDate) -> Self {
        value.to_string()
    }
}

/// Structured record identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub ordinal: u64,
    pub key: String,
    pub partition: String,
    pub time: ClockTime,
    pub date: CalendarDate,
    pub suffix: String,
}

impl Identifier {
    /// Build an identifier for the entry inserted at `ordinal`, stamped with `at`
    pub fn generate<R: Rng + ?Sized>(
        ordinal: u64,
        key: Option<&str>,
        partition: Option<&str>,
        at: &NaiveDateTime,
        rng: &mut R,
    ) -> Self {
        let suffix: String = rng
            .sample_iter(&Alphanumeric)
            .take(RANDOM_SUFFIX_LEN)
            .map(char::from)
            .collect();

        Self {
            ordinal,
            key: segment(key, DEFAULT_KEY),
            partition: segment(partition, DEFAULT_PARTITION),
            time: ClockTime::from_datetime(at),
            date: CalendarDate::from_datetime(at),
            suffix,
        }
    }
}

fn segment(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.replace(ID_SEPARATOR, "_"),
        _ => default.to_string(),
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}-{}",
            self.ordinal, self.key, self.partition, self.time, self.date, self.suffix
        )
    }
}

impl FromStr for Identifier {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(ID_SEPARATOR).collect();
        let [ordinal, key, partition, time, date, suffix] = parts[..] else {
            return Err(ParseIdError::SegmentCount(parts.len()));
        };

        Ok(Self {
            ordinal: ordinal
                .parse()
                .map_err(|_| ParseIdError::Ordinal(ordinal.to_string()))?,
            key: key.to_string(),
            partition: partition.to_string(),
            time: time.parse()?,
            date: date.parse()?,
            suffix: suffix.to_string(),
        })
    }
}
