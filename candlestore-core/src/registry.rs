//! Path/symbol registry: where each asset class lives on disk.
//!
//! Symbol lists are flat CSV files with a ticker column. They are re-read on
//! every call so edits are picked up without restarting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::retriever::SecurityDataRetriever;

/// One database per asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Index,
    Futures,
    Stocks,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [AssetClass::Index, AssetClass::Futures, AssetClass::Stocks];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Index => "index",
            AssetClass::Futures => "futures",
            AssetClass::Stocks => "stocks",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "index" => Ok(AssetClass::Index),
            "futures" => Ok(AssetClass::Futures),
            "stocks" => Ok(AssetClass::Stocks),
            other => Err(StoreError::Validation(format!(
                "unknown asset class '{other}' (expected index, futures or stocks)"
            ))),
        }
    }
}

/// Lookup of configured locations.
#[derive(Debug, Clone)]
pub struct Registry {
    config: StoreConfig,
}

impl Registry {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn db_path(&self, asset: AssetClass) -> &Path {
        self.config.databases.get(asset)
    }

    pub fn symbol_list_path(&self, asset: AssetClass) -> &Path {
        self.config.symbol_lists.get(asset)
    }

    pub fn report_dir(&self) -> &Path {
        &self.config.report_dir
    }

    /// Open a retriever on the asset class's database.
    pub fn open(&self, asset: AssetClass) -> Result<SecurityDataRetriever> {
        SecurityDataRetriever::open(self.db_path(asset))
    }

    /// Tickers listed in the asset class's symbol file, in file order.
    pub fn load_symbols(&self, asset: AssetClass) -> Result<Vec<String>> {
        load_ticker_column(self.symbol_list_path(asset), &self.config.ticker_column)
    }
}

/// Read the `column` cells of a CSV file, skipping blanks.
pub fn load_ticker_column(path: &Path, column: &str) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(StoreError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let idx = reader
        .headers()
        .map_err(|e| StoreError::Parse(format!("{}: {e}", path.display())))?
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| {
            StoreError::Parse(format!("{}: no '{column}' column", path.display()))
        })?;

    let mut tickers = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StoreError::Parse(format!("{}: {e}", path.display())))?;
        match record.get(idx) {
            Some(ticker) if !ticker.is_empty() => tickers.push(ticker.to_string()),
            _ => {}
        }
    }
    Ok(tickers)
}
