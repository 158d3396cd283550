//! Candlestore CLI: inspect and maintain per-symbol candlestick databases.
//!
//! Commands:
//! - `paths`: show configured database and symbol-list locations
//! - `symbols`: list symbol tables (or the tickers in a symbol-list file)
//! - `range`: earliest and latest record of a symbol
//! - `fetch`: print or export a symbol's rows from a start date
//! - `delete` / `delete-from`: drop a symbol or trim its recent rows
//! - `check`: integrity sweep for symbols with too little history
//! - `init-config`: write a starter config file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polars::prelude::{CsvWriter, SerWriter};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use candlestore_core::{
    AssetClass, DateRef, IntegrityOptions, Registry, SecurityDataRetriever, StoreConfig,
};

#[derive(Parser)]
#[command(
    name = "candlestore",
    about = "Candlestore CLI: per-symbol candlestick databases"
)]
struct Cli {
    /// Config file. Defaults to $CANDLESTORE_CONFIG, then ./candlestore.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show configured database and symbol-list paths.
    Paths,
    /// List symbol tables in an asset class's database.
    Symbols {
        /// index, futures or stocks.
        #[arg(long, default_value = "index")]
        asset: AssetClass,

        /// Read the asset class's symbol-list file instead of the database.
        #[arg(long, default_value_t = false)]
        from_list: bool,
    },
    /// Print the earliest and latest record of a symbol.
    Range {
        #[arg(long, default_value = "index")]
        asset: AssetClass,

        symbol: String,
    },
    /// Print a symbol's rows from a start date.
    Fetch {
        #[arg(long, default_value = "index")]
        asset: AssetClass,

        symbol: String,

        /// Days back from the latest record, or YYYY-MM-DD. Defaults to the earliest record.
        #[arg(long)]
        start: Option<DateRef>,

        /// Write the rows as CSV instead of printing them.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Drop a symbol's table.
    Delete {
        #[arg(long, default_value = "index")]
        asset: AssetClass,

        symbol: String,
    },
    /// Delete a symbol's rows after a date.
    DeleteFrom {
        #[arg(long, default_value = "index")]
        asset: AssetClass,

        symbol: String,

        /// Days back from the latest record, or YYYY-MM-DD. Defaults to 252 days.
        #[arg(long)]
        from: Option<DateRef>,
    },
    /// Flag symbols whose history starts after January 1 of a year.
    Check {
        #[arg(long, default_value = "index")]
        asset: AssetClass,

        /// Cutoff year. Defaults to three years ago.
        #[arg(long)]
        year: Option<i32>,

        /// Write the report as CSV to the configured report directory.
        #[arg(long, default_value_t = false)]
        log: bool,

        /// Drop every violating symbol table.
        #[arg(long, default_value_t = false)]
        delete: bool,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write a starter config file.
    InitConfig {
        /// Destination. Defaults to ./candlestore.toml.
        #[arg(default_value = "candlestore.toml")]
        path: PathBuf,

        /// Root directory for databases, lists and reports.
        #[arg(long, default_value = "data")]
        data_root: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::InitConfig { path, data_root } = &cli.command {
        return run_init_config(path, data_root);
    }

    let config = StoreConfig::load(cli.config.as_deref()).context("failed to load config")?;
    let registry = Registry::new(config);

    match cli.command {
        Commands::Paths => run_paths(&registry),
        Commands::Symbols { asset, from_list } => run_symbols(&registry, asset, from_list),
        Commands::Range { asset, symbol } => run_range(&registry, asset, &symbol),
        Commands::Fetch {
            asset,
            symbol,
            start,
            csv,
        } => run_fetch(&registry, asset, &symbol, start, csv.as_deref()),
        Commands::Delete { asset, symbol } => run_delete(&registry, asset, &symbol),
        Commands::DeleteFrom {
            asset,
            symbol,
            from,
        } => run_delete_from(&registry, asset, &symbol, from),
        Commands::Check {
            asset,
            year,
            log,
            delete,
            json,
        } => run_check(&registry, asset, year, log, delete, json),
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open(registry: &Registry, asset: AssetClass) -> Result<SecurityDataRetriever> {
    registry
        .open(asset)
        .with_context(|| format!("failed to open {asset} database"))
}

/// Close explicitly so a failing close is reported.
fn finish(mut retriever: SecurityDataRetriever) -> Result<()> {
    retriever.close().context("failed to close database")
}

fn run_paths(registry: &Registry) -> Result<()> {
    for asset in AssetClass::ALL {
        println!("{asset}:");
        println!("  database:    {}", registry.db_path(asset).display());
        println!("  symbol list: {}", registry.symbol_list_path(asset).display());
    }
    println!("reports: {}", registry.report_dir().display());
    Ok(())
}

fn run_symbols(registry: &Registry, asset: AssetClass, from_list: bool) -> Result<()> {
    let symbols = if from_list {
        registry
            .load_symbols(asset)
            .with_context(|| format!("failed to load {asset} symbol list"))?
    } else {
        let retriever = open(registry, asset)?;
        let symbols = retriever.list_symbols()?;
        finish(retriever)?;
        symbols
    };

    for symbol in &symbols {
        println!("{symbol}");
    }
    eprintln!("{} symbols", symbols.len());
    Ok(())
}

fn run_range(registry: &Registry, asset: AssetClass, symbol: &str) -> Result<()> {
    let retriever = open(registry, asset)?;
    let (earliest, latest) = retriever
        .date_range(symbol)
        .with_context(|| format!("failed to read date range for {symbol}"))?;
    finish(retriever)?;

    println!("{symbol}: {earliest} .. {latest}");
    Ok(())
}

fn run_fetch(
    registry: &Registry,
    asset: AssetClass,
    symbol: &str,
    start: Option<DateRef>,
    csv: Option<&Path>,
) -> Result<()> {
    let retriever = open(registry, asset)?;
    let mut df = retriever
        .fetch(symbol, start)
        .with_context(|| format!("failed to fetch {symbol}"))?;
    finish(retriever)?;

    match csv {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            CsvWriter::new(&mut file)
                .include_header(true)
                .finish(&mut df)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(rows = df.height(), path = %path.display(), "wrote rows");
        }
        None => println!("{df}"),
    }
    Ok(())
}

fn run_delete(registry: &Registry, asset: AssetClass, symbol: &str) -> Result<()> {
    let retriever = open(registry, asset)?;
    let dropped = retriever
        .delete_symbol(symbol)
        .with_context(|| format!("failed to delete {symbol}"))?;
    finish(retriever)?;

    if dropped {
        println!("Deleted all data for {symbol}.");
    } else {
        println!("No table for {symbol}; nothing deleted.");
    }
    Ok(())
}

fn run_delete_from(
    registry: &Registry,
    asset: AssetClass,
    symbol: &str,
    from: Option<DateRef>,
) -> Result<()> {
    let retriever = open(registry, asset)?;
    let removed = retriever
        .delete_from(symbol, from)
        .with_context(|| format!("failed to delete recent rows of {symbol}"))?;
    finish(retriever)?;

    println!("Deleted {removed} rows of {symbol}.");
    Ok(())
}

fn run_check(
    registry: &Registry,
    asset: AssetClass,
    year: Option<i32>,
    log: bool,
    delete: bool,
    json: bool,
) -> Result<()> {
    let defaults = IntegrityOptions::default();
    let opts = IntegrityOptions {
        year: year.unwrap_or(defaults.year),
        log,
        delete_on_violation: delete,
        report_dir: registry.report_dir().to_path_buf(),
    };

    let retriever = open(registry, asset)?;
    let report = retriever
        .check_integrity(&opts)
        .with_context(|| format!("integrity check failed for {asset}"))?;
    finish(retriever)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{:<24} {:<20} {:<20}", "symbol", "start", "end");
    for v in &report.violations {
        println!("{:<24} {:<20} {:<20}", v.symbol, v.earliest, v.latest);
    }
    println!(
        "{} of the {asset} symbols start after {}-01-01{}",
        report.violations.len(),
        report.year,
        if report.deleted { " (deleted)" } else { "" }
    );
    if !report.empty_tables.is_empty() {
        println!("empty tables: {}", report.empty_tables.join(", "));
    }
    if !report.malformed_tables.is_empty() {
        println!("tables without date-time: {}", report.malformed_tables.join(", "));
    }
    if let Some(path) = &report.report_path {
        println!("report written to {}", path.display());
    }
    Ok(())
}

fn run_init_config(path: &Path, data_root: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    let config = StoreConfig::rooted_at(data_root);
    std::fs::write(path, config.to_toml()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
