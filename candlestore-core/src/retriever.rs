//! Security data retriever: one SQLite connection, one asset-class database.
//!
//! The retriever is either open (connection live) or closed. `close()` moves
//! it to closed exactly once; after that every operation returns
//! [`StoreError::Closed`]. Dropping an open retriever closes the connection.

use chrono::NaiveDateTime;
use polars::prelude::DataFrame;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::date_ref::{DateRef, RecordBounds, DEFAULT_DELETE_WINDOW_DAYS};
use crate::error::{Result, StoreError};
use crate::frame::query_frame;
use crate::schema::{self, boundary, parse_stored, quote_identifier, table_name, DATE_TIME_COLUMN};

/// Which end of a table to read.
#[derive(Debug, Clone, Copy)]
enum Edge {
    First,
    Last,
}

impl Edge {
    fn order(self) -> &'static str {
        match self {
            Edge::First => "ASC",
            Edge::Last => "DESC",
        }
    }
}

pub struct SecurityDataRetriever {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SecurityDataRetriever {
    /// Open a connection to the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        tracing::debug!(db = %path.display(), "opened database");
        Ok(Self {
            path,
            conn: Some(conn),
        })
    }

    /// Database file this retriever is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Release the connection. Further calls fail with `Closed`.
    pub fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or(StoreError::Closed)?;
        conn.close().map_err(|(_, e)| StoreError::Engine(e))?;
        tracing::debug!(db = %self.path.display(), "closed database");
        Ok(())
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    /// Whether a table named `symbol` exists.
    pub fn table_exists(&self, symbol: &str) -> Result<bool> {
        let conn = self.conn()?;
        schema::validate_symbol(symbol)?;
        let found = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![symbol],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Quoted table name of an existing symbol table with a `date-time` column.
    fn require_table(&self, symbol: &str) -> Result<String> {
        let conn = self.conn()?;
        let table = table_name(symbol)?;
        if !self.table_exists(symbol)? {
            return Err(StoreError::not_found(symbol));
        }
        // An unknown double-quoted identifier degrades to a string literal,
        // so every query on `date-time` needs the column to exist.
        let has_column = conn
            .query_row(
                "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
                params![symbol, DATE_TIME_COLUMN],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !has_column {
            return Err(StoreError::MissingColumn {
                symbol: symbol.to_string(),
                column: DATE_TIME_COLUMN,
            });
        }
        Ok(table)
    }

    fn edge_date_time(&self, symbol: &str, edge: Edge) -> Result<NaiveDateTime> {
        let table = self.require_table(symbol)?;
        let sql = format!(
            "SELECT {} FROM {table} ORDER BY ROWID {} LIMIT 1",
            quote_identifier(DATE_TIME_COLUMN),
            edge.order()
        );
        let value: Option<Value> = self
            .conn()?
            .query_row(&sql, [], |row| row.get(0))
            .optional()?;

        match value {
            None => Err(StoreError::not_found(symbol)),
            Some(Value::Text(text)) => parse_stored(&text),
            Some(other) => Err(StoreError::Parse(format!(
                "{symbol}: {DATE_TIME_COLUMN} value {other:?} is not text"
            ))),
        }
    }

    /// Timestamp of the first inserted row.
    pub fn earliest(&self, symbol: &str) -> Result<NaiveDateTime> {
        self.edge_date_time(symbol, Edge::First)
    }

    /// Timestamp of the last inserted row.
    pub fn latest(&self, symbol: &str) -> Result<NaiveDateTime> {
        self.edge_date_time(symbol, Edge::Last)
    }

    pub fn date_range(&self, symbol: &str) -> Result<(NaiveDateTime, NaiveDateTime)> {
        Ok((self.earliest(symbol)?, self.latest(symbol)?))
    }

    /// Rows on or after `start`, ascending by `date-time`.
    ///
    /// `start` resolves per [`DateRef`]: unset means the earliest record,
    /// an integer counts days back from the latest record.
    pub fn fetch(&self, symbol: &str, start: impl Into<DateRef>) -> Result<DataFrame> {
        let table = self.require_table(symbol)?;
        let start = start.into();
        let from = boundary(start.resolve(self, symbol)?);

        let dt = quote_identifier(DATE_TIME_COLUMN);
        let sql = format!("SELECT * FROM {table} WHERE {dt} >= ?1 ORDER BY {dt}");
        tracing::debug!(%symbol, %start, %from, "fetch");

        let mut stmt = self.conn()?.prepare(&sql)?;
        query_frame(&mut stmt, params![from])
    }

    /// Names of all symbol tables, in catalog order.
    pub fn list_symbols(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
        )?;
        let symbols = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(symbols)
    }

    /// Drop a symbol's table. Returns whether a table was dropped.
    pub fn delete_symbol(&self, symbol: &str) -> Result<bool> {
        let conn = self.conn()?;
        let table = table_name(symbol)?;
        let existed = self.table_exists(symbol)?;
        conn.execute(&format!("DROP TABLE IF EXISTS {table}"), [])?;
        if existed {
            tracing::info!(%symbol, db = %self.path.display(), "deleted symbol table");
        } else {
            tracing::info!(%symbol, "no table to delete");
        }
        Ok(existed)
    }

    /// Delete rows strictly after `from`; `None` means the last
    /// [`DEFAULT_DELETE_WINDOW_DAYS`] days. Returns the number of rows removed.
    pub fn delete_from(&self, symbol: &str, from: Option<DateRef>) -> Result<usize> {
        let table = self.require_table(symbol)?;
        let from = from.unwrap_or(DateRef::DaysBack(DEFAULT_DELETE_WINDOW_DAYS));
        let cutoff = boundary(from.resolve(self, symbol)?);

        let sql = format!(
            "DELETE FROM {table} WHERE {} > ?1",
            quote_identifier(DATE_TIME_COLUMN)
        );
        let tx = self.conn()?.unchecked_transaction()?;
        let removed = tx.execute(&sql, params![cutoff])?;
        tx.commit()?;

        tracing::info!(%symbol, %cutoff, removed, "deleted rows after cutoff");
        Ok(removed)
    }
}

impl RecordBounds for SecurityDataRetriever {
    fn earliest(&self, symbol: &str) -> Result<NaiveDateTime> {
        SecurityDataRetriever::earliest(self, symbol)
    }

    fn latest(&self, symbol: &str) -> Result<NaiveDateTime> {
        SecurityDataRetriever::latest(self, symbol)
    }
}

impl Drop for SecurityDataRetriever {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.close() {
                Ok(()) => tracing::debug!(db = %self.path.display(), "closed database"),
                Err((_, e)) => {
                    tracing::warn!(db = %self.path.display(), error = %e, "failed to close database")
                }
            }
        }
    }
}

impl std::fmt::Debug for SecurityDataRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityDataRetriever")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Open a retriever, run `f`, and close it on every exit path.
pub fn with_retriever<T>(
    path: impl AsRef<Path>,
    f: impl FnOnce(&SecurityDataRetriever) -> Result<T>,
) -> Result<T> {
    let mut retriever = SecurityDataRetriever::open(path)?;
    let outcome = f(&retriever);
    let closed = retriever.close();
    let value = outcome?;
    closed?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn seeded() -> (tempfile::TempDir, SecurityDataRetriever) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index_data.db");
        let r = SecurityDataRetriever::open(&path).unwrap();
        r.conn()
            .unwrap()
            .execute_batch(
                r#"CREATE TABLE "ABC" ("date-time" TEXT, close REAL);
                   INSERT INTO "ABC" VALUES ('2020-01-01 09:15:00', 1.0);
                   INSERT INTO "ABC" VALUES ('2021-06-15 00:00:00', 2.0);
                   INSERT INTO "ABC" VALUES ('2021-06-15 09:15:00', 3.0);
                   INSERT INTO "ABC" VALUES ('2023-06-01 15:30:00', 4.0);
                   CREATE TABLE "EMPTY" ("date-time" TEXT, close REAL);"#,
            )
            .unwrap();
        (dir, r)
    }

    fn rows(r: &SecurityDataRetriever, symbol: &str) -> i64 {
        r.conn()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote_identifier(symbol)), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn earliest_and_latest_follow_rowid() {
        let (_dir, r) = seeded();
        let (first, last) = r.date_range("ABC").unwrap();
        assert_eq!(first, parse_stored("2020-01-01 09:15:00").unwrap());
        assert_eq!(last, parse_stored("2023-06-01 15:30:00").unwrap());
    }

    #[test]
    fn empty_symbol_is_validation_error() {
        let (_dir, r) = seeded();
        assert!(matches!(r.earliest(""), Err(StoreError::Validation(_))));
        assert!(matches!(r.delete_symbol(""), Err(StoreError::Validation(_))));
        assert!(matches!(r.fetch("", DateRef::Unset), Err(StoreError::Validation(_))));
    }

    #[test]
    fn missing_or_empty_table_is_not_found() {
        let (_dir, r) = seeded();
        assert!(matches!(r.earliest("NOPE"), Err(StoreError::NotFound { .. })));
        assert!(matches!(r.latest("EMPTY"), Err(StoreError::NotFound { .. })));
        assert!(matches!(r.fetch("NOPE", 10i64), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn fetch_from_text_date_is_inclusive_of_midnight() {
        let (_dir, r) = seeded();
        let df = r.fetch("ABC", "2021-06-15").unwrap();
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn delete_from_keeps_rows_at_cutoff() {
        let (_dir, r) = seeded();
        let date = NaiveDate::from_ymd_opt(2021, 6, 15).unwrap();
        let removed = r.delete_from("ABC", Some(date.into())).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(rows(&r, "ABC"), 2);
        assert_eq!(r.latest("ABC").unwrap(), parse_stored("2021-06-15 00:00:00").unwrap());
    }

    #[test]
    fn delete_from_defaults_to_trading_year() {
        let (_dir, r) = seeded();
        // latest is 2023-06-01, 252 days earlier is 2022-09-22
        let removed = r.delete_from("ABC", None).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(rows(&r, "ABC"), 3);
    }

    #[test]
    fn delete_symbol_is_idempotent() {
        let (_dir, r) = seeded();
        assert!(r.delete_symbol("ABC").unwrap());
        assert!(!r.delete_symbol("ABC").unwrap());
        assert!(!r.list_symbols().unwrap().contains(&"ABC".to_string()));
    }

    #[test]
    fn table_without_date_time_column_is_rejected() {
        let (_dir, r) = seeded();
        r.conn()
            .unwrap()
            .execute_batch(
                r#"CREATE TABLE "BAD" (ts TEXT, close REAL);
                   INSERT INTO "BAD" VALUES ('2020-01-01 09:15:00', 1.0);"#,
            )
            .unwrap();

        let missing = |res: Result<()>| matches!(res, Err(StoreError::MissingColumn { .. }));
        assert!(missing(r.fetch("BAD", "2030-01-01").map(|_| ())));
        assert!(missing(r.delete_from("BAD", Some("2030-01-01".into())).map(|_| ())));
        assert!(missing(r.earliest("BAD").map(|_| ())));
        assert!(missing(r.latest("BAD").map(|_| ())));
        assert_eq!(rows(&r, "BAD"), 1);
    }

    #[test]
    fn malformed_date_time_text_is_parse_error() {
        let (_dir, r) = seeded();
        r.conn()
            .unwrap()
            .execute_batch(
                r#"CREATE TABLE "US" ("date-time" TEXT, close REAL);
                   INSERT INTO "US" VALUES ('05/01/2021', 1.0);"#,
            )
            .unwrap();
        assert!(matches!(r.earliest("US"), Err(StoreError::Parse(_))));
        assert!(matches!(r.latest("US"), Err(StoreError::Parse(_))));
    }

    #[test]
    fn non_text_date_time_is_parse_error() {
        let (_dir, r) = seeded();
        // No declared type, so the integer keeps its storage class
        r.conn()
            .unwrap()
            .execute_batch(
                r#"CREATE TABLE "EPOCH" ("date-time", close REAL);
                   INSERT INTO "EPOCH" VALUES (1609459200, 1.0);"#,
            )
            .unwrap();
        assert!(matches!(r.earliest("EPOCH"), Err(StoreError::Parse(_))));
        assert!(matches!(r.latest("EPOCH"), Err(StoreError::Parse(_))));
    }

    #[test]
    fn closed_retriever_rejects_operations() {
        let (_dir, mut r) = seeded();
        r.close().unwrap();
        assert!(!r.is_open());
        assert!(matches!(r.list_symbols(), Err(StoreError::Closed)));
        assert!(matches!(r.earliest("ABC"), Err(StoreError::Closed)));
        assert!(matches!(r.delete_from("ABC", None), Err(StoreError::Closed)));
        assert!(matches!(r.close(), Err(StoreError::Closed)));
    }

    #[test]
    fn closed_retriever_reports_closed_before_validating_symbol() {
        let (_dir, mut r) = seeded();
        r.close().unwrap();
        assert!(matches!(r.earliest(""), Err(StoreError::Closed)));
        assert!(matches!(r.table_exists(""), Err(StoreError::Closed)));
        assert!(matches!(r.delete_symbol(""), Err(StoreError::Closed)));
        assert!(matches!(r.fetch("", DateRef::Unset), Err(StoreError::Closed)));
    }

    #[test]
    fn with_retriever_returns_closure_result() {
        let (dir, r) = seeded();
        let path = r.path().to_path_buf();
        drop(r);

        let symbols = with_retriever(&path, |r| r.list_symbols()).unwrap();
        assert_eq!(symbols, vec!["ABC", "EMPTY"]);

        let err = with_retriever(&path, |r| r.earliest("EMPTY")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        drop(dir);
    }
}
