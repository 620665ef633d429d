//! Calendar keys used to address buckets and month plans.
//!
//! - [`DateKey`] is a calendar date rendered as `YYYY-MM-DD`.
//! - [`MonthKey`] is `YEAR-MONTHINDEX` with a 0-based month index, so
//!   `2025-0` is January 2025 and `2025-11` is December 2025.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an invalid date or month key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("invalid date key {0:?} (expected YYYY-MM-DD)")]
    Date(String),

    #[error("invalid month key {0:?} (expected YEAR-MONTHINDEX with a 0-based index)")]
    Month(String),
}

// ---------------------------------------------------------------------------

/// A bucket key: one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Build from calendar components. Returns `None` for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The month this date belongs to.
    pub fn month(&self) -> MonthKey {
        MonthKey::of(self.0)
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // chrono accepts unpadded fields; bucket keys are always padded.
        if s.len() != 10 {
            return Err(KeyParseError::Date(s.to_owned()));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| KeyParseError::Date(s.to_owned()))
    }
}

impl TryFrom<String> for DateKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

// ---------------------------------------------------------------------------

/// A month plan key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    year: i32,
    index: u32,
}

impl MonthKey {
    /// Build from a year and a 0-based month index.
    pub fn new(year: i32, index: u32) -> Option<Self> {
        (index < 12).then_some(Self { year, index })
    }

    /// The month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            index: date.month0(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// 0-based month index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Whether `date` falls inside this month.
    pub fn contains(&self, date: DateKey) -> bool {
        date.month() == *self
    }

    pub fn first_day(&self) -> DateKey {
        DateKey(NaiveDate::from_ymd_opt(self.year, self.index + 1, 1).unwrap_or(NaiveDate::MIN))
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.index)
    }
}

impl FromStr for MonthKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || KeyParseError::Month(s.to_owned());
        let (year, index) = s.rsplit_once('-').ok_or_else(err)?;
        // "2025-01" would be ambiguous with a 1-based month, so reject it.
        if index.is_empty() || (index.len() > 1 && index.starts_with('0')) {
            return Err(err());
        }
        let year: i32 = year.parse().map_err(|_| err())?;
        let index: u32 = index.parse().map_err(|_| err())?;
        Self::new(year, index).ok_or_else(err)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}
