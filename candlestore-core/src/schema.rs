//! Layout shared by every security table.
//!
//! Each symbol owns one table whose `date-time` column holds
//! `YYYY-MM-DD HH:MM:SS` text; the remaining candlestick columns are passed
//! through untouched.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Result, StoreError};

/// Name of the timestamp column in every security table.
pub const DATE_TIME_COLUMN: &str = "date-time";

/// Format of the stored `date-time` text.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format accepted for textual date arguments.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reject symbols that can never name a table.
pub fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() {
        return Err(StoreError::Validation("a symbol is required".into()));
    }
    if symbol.contains('\0') {
        return Err(StoreError::Validation(format!(
            "symbol {symbol:?} contains a NUL byte"
        )));
    }
    Ok(())
}

/// Quote an identifier for SQLite: wrap in `"` and double embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validate a symbol and return it quoted as a table name.
pub fn table_name(symbol: &str) -> Result<String> {
    validate_symbol(symbol)?;
    Ok(quote_identifier(symbol))
}

/// Parse a stored `date-time` value.
pub fn parse_stored(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT).map_err(|e| {
        StoreError::Parse(format!(
            "{DATE_TIME_COLUMN} value {text:?} does not match {DATE_TIME_FORMAT}: {e}"
        ))
    })
}

/// Render a timestamp the way tables store it.
pub fn format_stored(dt: &NaiveDateTime) -> String {
    dt.format(DATE_TIME_FORMAT).to_string()
}

/// Query boundary for a calendar date: midnight in the stored format.
pub fn boundary(date: NaiveDate) -> String {
    format_stored(&date.and_time(NaiveTime::MIN))
}
