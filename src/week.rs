//! Week identifiers and the block ids namespaced by them.
//!
//! A week is `YEAR || NN` where `NN = ceil((daysSinceJan1 + jan1Weekday + 1) / 7)`
//! and weekdays count from Sunday = 0. Weeks therefore start on Sunday and
//! the first (partial) week of the year is week 1. This is not ISO-8601.
//!
//! The week number is always rendered with two digits so the identifier has
//! a fixed width of six characters. Five-character identifiers written by
//! older deployments (`20265`) are still accepted when parsing.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

use crate::{AppError, Result};

const BLOCK_PREFIX: &str = "week:";

/// One custom-numbered calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekId {
    year: i32,
    week: u32,
}

impl WeekId {
    /// Week containing `date`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        let days_since_jan1 = date.ordinal0();
        let weekday = date.weekday().num_days_from_sunday();
        let jan1_weekday = (weekday + 7 - days_since_jan1 % 7) % 7;
        Self {
            year: date.year(),
            week: (days_since_jan1 + jan1_weekday + 1).div_ceil(7),
        }
    }

    /// Week containing the UTC date of `instant`.
    #[must_use]
    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self::from_date(instant.date_naive())
    }

    /// Calendar year.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Week number within the year, starting at 1.
    #[must_use]
    pub fn week(&self) -> u32 {
        self.week
    }

    /// Integer form written to the record store (`202605`).
    #[must_use]
    pub fn as_number(&self) -> i64 {
        i64::from(self.year) * 100 + i64::from(self.week)
    }
}

impl Display for WeekId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.week)
    }
}

impl FromStr for WeekId {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self> {
        let invalid = || AppError::Payload(format!("invalid week identifier: {raw:?}"));

        if !raw.bytes().all(|b| b.is_ascii_digit()) || !(5..=6).contains(&raw.len()) {
            return Err(invalid());
        }
        let (year, week) = raw.split_at(4);
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        if !(1..=54).contains(&week) {
            return Err(invalid());
        }
        Ok(Self { year, week })
    }
}

impl<'de> Deserialize<'de> for WeekId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Block id of the form `week:<id>:<field>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekBlockId {
    /// Week the block belongs to.
    pub week: WeekId,
    /// Field or purpose suffix (`Performance`, `Notes`, ...).
    pub field: String,
}

impl WeekBlockId {
    /// Build a block id for `field` in `week`.
    pub fn new(week: WeekId, field: impl Into<String>) -> Self {
        Self {
            week,
            field: field.into(),
        }
    }

    /// Parse a block id by splitting on the `:` delimiters.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Payload` when the prefix, week or field is missing.
    pub fn parse(raw: &str) -> Result<Self> {
        let rest = raw
            .strip_prefix(BLOCK_PREFIX)
            .ok_or_else(|| AppError::Payload(format!("block id without week prefix: {raw:?}")))?;
        let (week, field) = rest
            .split_once(':')
            .ok_or_else(|| AppError::Payload(format!("block id without field: {raw:?}")))?;
        if field.is_empty() {
            return Err(AppError::Payload(format!("block id without field: {raw:?}")));
        }
        Ok(Self {
            week: week.parse()?,
            field: field.to_owned(),
        })
    }
}

impl Display for WeekBlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{BLOCK_PREFIX}{}:{}", self.week, self.field)
    }
}
