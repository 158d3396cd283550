//! Candlestore Core: per-symbol candlestick tables in SQLite.
//!
//! - Configuration and the path/symbol registry for the index, futures and
//!   stocks databases
//! - Date references that resolve against a symbol's first and last records
//! - The security data retriever: list, fetch, delete, trim
//! - The integrity sweep over every symbol table

pub mod config;
pub mod date_ref;
pub mod error;
pub mod frame;
pub mod integrity;
pub mod registry;
pub mod retriever;
pub mod schema;

pub use config::{AssetPaths, StoreConfig};
pub use date_ref::{DateRef, RecordBounds, DEFAULT_DELETE_WINDOW_DAYS};
pub use error::{Result, StoreError};
pub use integrity::{IntegrityOptions, IntegrityReport, Violation};
pub use registry::{AssetClass, Registry};
pub use retriever::{with_retriever, SecurityDataRetriever};
