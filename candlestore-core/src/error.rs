//! Structured error types for store operations.
//!
//! One enum covers the whole crate so CLI callers can match on the kind:
//! validation, lookup, parsing, usage-after-close, and engine failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("symbol not found: {symbol}")]
    NotFound { symbol: String },

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("table {symbol} has no {column:?} column")]
    MissingColumn { symbol: String, column: &'static str },

    #[error("retriever is closed; open a new one")]
    Closed,

    #[error("sqlite error: {0}")]
    Engine(#[from] rusqlite::Error),

    #[error("dataframe error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn not_found(symbol: &str) -> Self {
        StoreError::NotFound {
            symbol: symbol.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
