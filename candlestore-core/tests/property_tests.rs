//! Property tests for date-range resolution and trimming.
//!
//! Uses proptest to verify:
//! 1. `fetch(DaysBack(n))` returns exactly the rows on or after the resolved date
//! 2. `delete_from(D)` removes exactly the rows strictly after `D 00:00:00`
//! 3. The integrity sweep flags exactly the symbols starting after the cutoff

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use rusqlite::{params, Connection};

use candlestore_core::schema::format_stored;
use candlestore_core::{DateRef, IntegrityOptions, SecurityDataRetriever};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Strictly increasing timestamps: minute gaps of up to three days.
fn arb_series() -> impl Strategy<Value = Vec<NaiveDateTime>> {
    prop::collection::vec(1i64..4320, 1..60).prop_map(|gaps| {
        let mut ts = NaiveDate::from_ymd_opt(2021, 1, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        gaps.into_iter()
            .map(|g| {
                ts += Duration::minutes(g);
                ts
            })
            .collect()
    })
}

fn seeded(series: &[NaiveDateTime]) -> (tempfile::TempDir, SecurityDataRetriever) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("prop.db");
    let conn = Connection::open(&db).unwrap();
    conn.execute_batch("CREATE TABLE \"SYM\" (\"date-time\" TEXT, close REAL)")
        .unwrap();
    for (i, ts) in series.iter().enumerate() {
        conn.execute(
            "INSERT INTO \"SYM\" VALUES (?1, ?2)",
            params![format_stored(ts), i as f64],
        )
        .unwrap();
    }
    drop(conn);
    let r = SecurityDataRetriever::open(&db).unwrap();
    (dir, r)
}

fn midnight(d: NaiveDate) -> NaiveDateTime {
    d.and_hms_opt(0, 0, 0).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn earliest_not_after_latest(series in arb_series()) {
        let (_dir, r) = seeded(&series);
        let (first, last) = r.date_range("SYM").unwrap();
        prop_assert!(first <= last);
        prop_assert_eq!(first, series[0]);
        prop_assert_eq!(last, *series.last().unwrap());
    }

    #[test]
    fn fetch_days_back_matches_filter(series in arb_series(), days in 0i64..120) {
        let (_dir, r) = seeded(&series);
        let latest = *series.last().unwrap();
        let bound = midnight((latest - Duration::days(days)).date());
        let expected = series.iter().filter(|ts| **ts >= bound).count();

        let df = r.fetch("SYM", DateRef::DaysBack(days)).unwrap();
        prop_assert_eq!(df.height(), expected);
    }

    #[test]
    fn delete_from_removes_exactly_later_rows(series in arb_series(), offset in 0i64..120) {
        let (_dir, r) = seeded(&series);
        let cut_date = series[0].date() + Duration::days(offset);
        let bound = midnight(cut_date);
        let later = series.iter().filter(|ts| **ts > bound).count();

        let removed = r.delete_from("SYM", Some(DateRef::Date(cut_date))).unwrap();
        prop_assert_eq!(removed, later);

        let all_time = DateRef::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        let kept = r.fetch("SYM", all_time).unwrap();
        prop_assert_eq!(kept.height(), series.len() - later);
    }

    #[test]
    fn sweep_flags_iff_start_after_cutoff(series in arb_series(), year in 2019i32..2024) {
        let (_dir, r) = seeded(&series);
        let cutoff = midnight(NaiveDate::from_ymd_opt(year, 1, 1).unwrap());

        let report = r.check_integrity(&IntegrityOptions::for_year(year)).unwrap();
        prop_assert_eq!(report.violations.len() == 1, series[0] > cutoff);
    }
}
