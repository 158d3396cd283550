//! Polymorphic start/end boundaries.
//!
//! Callers name a boundary as an offset from the latest record, a
//! `YYYY-MM-DD` string, a structured date/time, or nothing at all. Every form
//! resolves to a calendar date against one symbol's records.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StoreError};
use crate::schema::DATE_FORMAT;

/// Trading-year approximation used when `delete_from` gets no boundary.
pub const DEFAULT_DELETE_WINDOW_DAYS: i64 = 252;

/// First and last record timestamps of a symbol.
///
/// Implemented by the retriever; tests substitute fixed values.
pub trait RecordBounds {
    fn earliest(&self, symbol: &str) -> Result<NaiveDateTime>;
    fn latest(&self, symbol: &str) -> Result<NaiveDateTime>;
}

/// A start/end boundary before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateRef {
    /// Resolve to the symbol's earliest record.
    #[default]
    Unset,
    /// This many days before the symbol's latest record.
    DaysBack(i64),
    /// A `YYYY-MM-DD` string, parsed at resolution time.
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl DateRef {
    /// Resolve to a calendar date using `bounds` for the relative forms.
    pub fn resolve(&self, bounds: &impl RecordBounds, symbol: &str) -> Result<NaiveDate> {
        match self {
            DateRef::Unset => Ok(bounds.earliest(symbol)?.date()),
            DateRef::DaysBack(days) => {
                let latest = bounds.latest(symbol)?;
                TimeDelta::try_days(*days)
                    .and_then(|delta| latest.checked_sub_signed(delta))
                    .map(|dt| dt.date())
                    .ok_or_else(|| {
                        StoreError::Validation(format!("day offset {days} is out of range"))
                    })
            }
            DateRef::Text(text) => parse_date(text),
            DateRef::Date(date) => Ok(*date),
            DateRef::DateTime(dt) => Ok(dt.date()),
        }
    }
}

/// Parse a `YYYY-MM-DD` argument.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    if text.trim().is_empty() {
        return Err(StoreError::Validation("a date is required".into()));
    }
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| StoreError::Parse(format!("date {text:?} is not YYYY-MM-DD: {e}")))
}

impl From<i64> for DateRef {
    fn from(days: i64) -> Self {
        DateRef::DaysBack(days)
    }
}

impl From<&str> for DateRef {
    fn from(text: &str) -> Self {
        DateRef::Text(text.to_string())
    }
}

impl From<String> for DateRef {
    fn from(text: String) -> Self {
        DateRef::Text(text)
    }
}

impl From<NaiveDate> for DateRef {
    fn from(date: NaiveDate) -> Self {
        DateRef::Date(date)
    }
}

impl From<NaiveDateTime> for DateRef {
    fn from(dt: NaiveDateTime) -> Self {
        DateRef::DateTime(dt)
    }
}

impl<T: Into<DateRef>> From<Option<T>> for DateRef {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Command-line form: an integer is a day offset, anything else a date string.
impl FromStr for DateRef {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StoreError::Validation("a date reference is required".into()));
        }
        match s.parse::<i64>() {
            Ok(days) => Ok(DateRef::DaysBack(days)),
            Err(_) => {
                parse_date(s)?;
                Ok(DateRef::Text(s.to_string()))
            }
        }
    }
}

impl fmt::Display for DateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRef::Unset => write!(f, "earliest"),
            DateRef::DaysBack(days) => write!(f, "latest - {days}d"),
            DateRef::Text(text) => write!(f, "{text}"),
            DateRef::Date(date) => write!(f, "{date}"),
            DateRef::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}
