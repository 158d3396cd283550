//! Integrity sweep: find symbols whose history starts too late.
//!
//! A symbol violates the check when its first record is strictly after
//! January 1 of the cutoff year. Violations can be dropped on the spot and
//! the report written as CSV next to other reports.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::retriever::SecurityDataRetriever;
use crate::schema::format_stored;

/// Years of history a symbol is expected to have by default.
pub const DEFAULT_HISTORY_YEARS: i32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityOptions {
    /// Cutoff year; history must start on or before `year-01-01`.
    pub year: i32,
    /// Write the report as CSV when there are violations.
    pub log: bool,
    /// Drop each violating table as it is found.
    pub delete_on_violation: bool,
    /// Directory for the CSV report.
    pub report_dir: PathBuf,
}

impl Default for IntegrityOptions {
    fn default() -> Self {
        Self {
            year: Local::now().year() - DEFAULT_HISTORY_YEARS,
            log: false,
            delete_on_violation: false,
            report_dir: PathBuf::from("reports"),
        }
    }
}

impl IntegrityOptions {
    pub fn for_year(year: i32) -> Self {
        Self {
            year,
            ..Self::default()
        }
    }

    /// Midnight on January 1 of the cutoff year.
    pub fn cutoff(&self) -> Result<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, 1, 1)
            .map(|d| d.and_time(NaiveTime::MIN))
            .ok_or_else(|| StoreError::Validation(format!("year {} is out of range", self.year)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub symbol: String,
    pub earliest: NaiveDateTime,
    pub latest: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub year: i32,
    pub violations: Vec<Violation>,
    /// Tables with no rows; listed but never dropped.
    pub empty_tables: Vec<String>,
    /// Tables without a `date-time` column; skipped.
    pub malformed_tables: Vec<String>,
    /// Whether violating tables were dropped.
    pub deleted: bool,
    /// Where the CSV report was written, if it was.
    pub report_path: Option<PathBuf>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// The report as CSV: `symbol,start,end`.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(["symbol", "start", "end"])?;
        for v in &self.violations {
            wtr.write_record([
                v.symbol.clone(),
                format_stored(&v.earliest),
                format_stored(&v.latest),
            ])?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| StoreError::Parse(format!("report encoding: {e}")))
    }

    /// Write the CSV report to `path`, creating parent directories.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_csv_string()?)?;
        Ok(())
    }
}

/// `{report_dir}/{db file name up to its first dot}.csv`
pub fn report_path(report_dir: &Path, db_path: &Path) -> PathBuf {
    let name = db_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match name.split('.').next() {
        Some(stem) if !stem.is_empty() => stem,
        _ => "report",
    };
    report_dir.join(format!("{stem}.csv"))
}

impl SecurityDataRetriever {
    /// Sweep every symbol table against `opts.year`.
    pub fn check_integrity(&self, opts: &IntegrityOptions) -> Result<IntegrityReport> {
        let cutoff = opts.cutoff()?;
        let mut violations = Vec::new();
        let mut empty_tables = Vec::new();
        let mut malformed_tables = Vec::new();

        for symbol in self.list_symbols()? {
            let earliest = match self.earliest(&symbol) {
                Ok(dt) => dt,
                Err(StoreError::NotFound { .. }) => {
                    tracing::warn!(%symbol, "symbol table has no rows");
                    empty_tables.push(symbol);
                    continue;
                }
                Err(StoreError::MissingColumn { .. }) => {
                    tracing::warn!(%symbol, "symbol table has no date-time column");
                    malformed_tables.push(symbol);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if earliest <= cutoff {
                continue;
            }

            let latest = self.latest(&symbol)?;
            tracing::info!(%symbol, %earliest, %latest, "history starts after cutoff");
            if opts.delete_on_violation {
                self.delete_symbol(&symbol)?;
            }
            violations.push(Violation {
                symbol,
                earliest,
                latest,
            });
        }

        let mut report = IntegrityReport {
            year: opts.year,
            violations,
            empty_tables,
            malformed_tables,
            deleted: opts.delete_on_violation,
            report_path: None,
        };

        if opts.log && !report.is_clean() {
            let path = report_path(&opts.report_dir, self.path());
            report.write_csv(&path)?;
            tracing::info!(path = %path.display(), "wrote integrity report");
            report.report_path = Some(path);
        }

        tracing::info!(
            db = %self.path().display(),
            year = opts.year,
            violations = report.violations.len(),
            empty = report.empty_tables.len(),
            malformed = report.malformed_tables.len(),
            "integrity check finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_stored;

    fn violation(symbol: &str, start: &str, end: &str) -> Violation {
        Violation {
            symbol: symbol.into(),
            earliest: parse_stored(start).unwrap(),
            latest: parse_stored(end).unwrap(),
        }
    }

    #[test]
    fn default_year_is_three_years_back() {
        let opts = IntegrityOptions::default();
        assert_eq!(opts.year, Local::now().year() - 3);
        assert!(!opts.log);
        assert!(!opts.delete_on_violation);
    }

    #[test]
    fn cutoff_is_new_year_midnight() {
        let opts = IntegrityOptions::for_year(2022);
        assert_eq!(opts.cutoff().unwrap(), parse_stored("2022-01-01 00:00:00").unwrap());
        assert!(IntegrityOptions::for_year(i32::MAX).cutoff().is_err());
    }

    #[test]
    fn report_path_uses_db_stem() {
        let p = report_path(Path::new("/reports"), Path::new("/data/futures/futures_data.db"));
        assert_eq!(p, PathBuf::from("/reports/futures_data.csv"));
    }

    #[test]
    fn report_path_stops_at_first_dot() {
        let p = report_path(Path::new("/reports"), Path::new("/data/index.2024.db"));
        assert_eq!(p, PathBuf::from("/reports/index.csv"));
        let p = report_path(Path::new("/reports"), Path::new("/data/.db"));
        assert_eq!(p, PathBuf::from("/reports/report.csv"));
    }

    #[test]
    fn csv_has_header_and_stored_format() {
        let report = IntegrityReport {
            year: 2022,
            violations: vec![violation("XYZ", "2022-03-01 09:15:00", "2023-06-01 15:30:00")],
            empty_tables: vec![],
            malformed_tables: vec![],
            deleted: false,
            report_path: None,
        };
        let csv = report.to_csv_string().unwrap();
        assert_eq!(
            csv,
            "symbol,start,end\nXYZ,2022-03-01 09:15:00,2023-06-01 15:30:00\n"
        );
    }
}
