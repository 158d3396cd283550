//! Store configuration: database and symbol-list locations per asset class.
//!
//! Loaded once at startup from a TOML file; nothing is compiled in.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::registry::AssetClass;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CANDLESTORE_CONFIG";

/// Config file looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "candlestore.toml";

/// One path per asset class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetPaths {
    pub index: PathBuf,
    pub futures: PathBuf,
    pub stocks: PathBuf,
}

impl AssetPaths {
    pub fn get(&self, asset: AssetClass) -> &Path {
        match asset {
            AssetClass::Index => &self.index,
            AssetClass::Futures => &self.futures,
            AssetClass::Stocks => &self.stocks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// SQLite database per asset class.
    pub databases: AssetPaths,
    /// Ticker list (CSV) per asset class.
    pub symbol_lists: AssetPaths,
    /// Where integrity reports are written.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    /// Header of the ticker column in symbol-list files.
    #[serde(default = "default_ticker_column")]
    pub ticker_column: String,
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_ticker_column() -> String {
    "Ticker".to_string()
}

impl StoreConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(format!("parse config TOML: {e}")))
    }

    /// Serialize the config to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(format!("serialize config: {e}")))
    }

    /// Resolve the config file: explicit path, then `$CANDLESTORE_CONFIG`,
    /// then `./candlestore.toml`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        };
        tracing::debug!(path = %path.display(), "loading config");
        Self::from_file(&path)
    }

    /// A starter config rooted at `data_root`, laid out one directory per asset class.
    pub fn rooted_at(data_root: &Path) -> Self {
        Self {
            databases: AssetPaths {
                index: data_root.join("index/index_data.db"),
                futures: data_root.join("futures/futures_data.db"),
                stocks: data_root.join("stocks/stocks_data.db"),
            },
            symbol_lists: AssetPaths {
                index: data_root.join("lists/nse_index.csv"),
                futures: data_root.join("lists/nse_fyers_futures.csv"),
                stocks: data_root.join("lists/nse_500_stocks.csv"),
            },
            report_dir: data_root.join("reports"),
            ticker_column: default_ticker_column(),
        }
    }
}
