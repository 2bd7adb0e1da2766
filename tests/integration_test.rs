//! Integration tests for calendar-relative fetching.
//!
//! Tests cover:
//! - Calendar loading from a store and weekend-aware resolution
//! - Look-ahead guard of history reads
//! - Daily cross-sections reindexed to the universe
//! - One store query per window, connectivity errors surfacing unchanged
//! - Multi-date assembly and skipping
//! - Intraday coordinates carrying across closed days
//! - Record reads and universe loading
//! - CSV import followed by a fetch, SQLite and memory stores agreeing

mod common;

use approx::assert_relative_eq;
use common::*;
use pitfetch::adapters::csv_adapter::{self, ImportLayout};
use pitfetch::adapters::memory_adapter::MemoryStore;
use pitfetch::domain::calendar::{Direction, TradingCalendar};
use pitfetch::domain::clock::IntradayClock;
use pitfetch::domain::error::FetchError;
use pitfetch::domain::fetcher::{
    DayFetcher, Fetcher, IntradayFetcher, IntradayRequest, RecordDates, RecordFetcher,
};
use pitfetch::domain::options::{FetchOptions, OptionOverrides};
use pitfetch::domain::table::Label;
use pitfetch::domain::universe::Universe;
use pitfetch::ports::store_port::{Document, DocumentWriter};
use std::sync::Arc;

fn day_fetcher() -> DayFetcher {
    DayFetcher::new(
        context(Arc::new(seeded_store()), "kday"),
        FetchOptions::default(),
    )
}

fn dates(ds: &[&str]) -> Vec<String> {
    ds.iter().map(|d| d.to_string()).collect()
}

mod calendar_source {
    use super::*;

    #[test]
    fn calendar_from_store_skips_closed_days() {
        let store = seeded_store();
        let cal = TradingCalendar::from_store(&store, "dates").unwrap();
        assert_eq!(cal.len(), 10);
        assert_eq!(
            cal.resolve("20140104", Direction::Backward).unwrap().1,
            "20140103"
        );
        assert_eq!(
            cal.resolve("20140105", Direction::Forward).unwrap().1,
            "20140106"
        );
    }

    #[test]
    fn empty_calendar_collection_is_rejected() {
        let store = MemoryStore::new();
        let result = TradingCalendar::from_store(&store, "dates");
        assert!(matches!(result, Err(FetchError::InvalidCalendar { .. })));
    }
}

mod day_reads {
    use super::*;

    #[test]
    fn history_never_reaches_base_date() {
        let f = day_fetcher();
        for (i, date) in TRADING_DAYS.iter().enumerate().skip(3) {
            let t = f
                .fetch_history("close", date, 3, &OptionOverrides::none())
                .unwrap();
            assert_eq!(t.nrows(), 3);
            assert!(t.index.iter().all(|l| l.to_string().as_str() < *date));
            assert_eq!(t.index[2], Label::from(TRADING_DAYS[i - 1]));
        }
    }

    #[test]
    fn history_on_closed_day_resolves_backward() {
        let f = day_fetcher();
        let t = f
            .fetch_history("close", "20140105", 1, &OptionOverrides::none())
            .unwrap();
        assert_eq!(t.index, vec![Label::from("20140102")]);

        let short = f
            .fetch_history("close", "20140105", 2, &OptionOverrides::none())
            .unwrap();
        assert!(short.is_empty());
    }

    #[test]
    fn daily_cross_section_reindexed() {
        let f = day_fetcher();
        let s = f
            .fetch_daily("P", TRADING_DAYS[4], 0, &OptionOverrides::none().reindex(true))
            .unwrap();
        assert_eq!(s.index, dates(&UNIVERSE));
        assert_eq!(s.get("000001"), Some(10.0));
        assert_eq!(s.get("000002"), Some(20.0));
        assert_eq!(s.get("600000"), None);
    }

    #[test]
    fn fetch_window_clamps_at_calendar_edges() {
        let f = day_fetcher();
        let t = f
            .fetch("close", "20131201", Some("20140301"), 5, &OptionOverrides::none())
            .unwrap();
        assert_eq!(t.nrows(), 10);
        assert_relative_eq!(t.get(&Label::from("20140115"), "000002").unwrap(), 100.0);
    }

    #[test]
    fn one_query_per_window() {
        let store = Arc::new(CountingStore::new(seeded_store()));
        let f = DayFetcher::new(context(Arc::clone(&store), "kday"), FetchOptions::default());
        f.fetch("close", "20140106", Some("20140110"), 0, &OptionOverrides::none())
            .unwrap();
        assert_eq!(store.finds(), 1);
        f.fetch_daily("close", "20140110", 1, &OptionOverrides::none())
            .unwrap();
        assert_eq!(store.finds(), 2);
    }

    #[test]
    fn connectivity_error_propagates_from_batch() {
        let f = DayFetcher::new(context(Arc::new(FailingStore), "kday"), FetchOptions::default());
        let result = f.fetch_dates(
            "close",
            &dates(&["20140106", "20140107"]),
            0,
            0,
            &OptionOverrides::none(),
        );
        assert!(matches!(result, Err(FetchError::Connectivity { .. })));
    }

    #[test]
    fn fetch_dates_drops_dates_without_history() {
        let store = Arc::new(CountingStore::new(seeded_store()));
        let f = DayFetcher::new(context(Arc::clone(&store), "kday"), FetchOptions::default());
        let frame = f
            .fetch_dates(
                "close",
                &dates(&["20131231", "20140102", "20140108", "20140115"]),
                2,
                0,
                &OptionOverrides::none(),
            )
            .unwrap();
        let panel = frame.as_panel().unwrap();
        assert_eq!(
            panel.items,
            vec![Label::from("20140108"), Label::from("20140115")]
        );
        assert_eq!(store.finds(), 2);
    }

    #[test]
    fn fetch_dates_datetime_index_labels() {
        let f = day_fetcher();
        let frame = f
            .fetch_dates(
                "close",
                &dates(&["20140107", "20140113"]),
                0,
                0,
                &OptionOverrides::none().datetime_index(true).reindex(true),
            )
            .unwrap();
        let table = frame.as_table().unwrap();
        assert!(table.index.iter().all(|l| matches!(l, Label::Date(_))));
        assert_eq!(table.columns, dates(&UNIVERSE));
    }

    #[test]
    fn strict_date_check_rejects_garbage() {
        let f = DayFetcher::new(
            context(Arc::new(seeded_store()), "kday"),
            FetchOptions {
                date_check: true,
                ..FetchOptions::default()
            },
        );
        let result = f.fetch("close", "2014-13-45", None, 0, &OptionOverrides::none());
        assert!(matches!(result, Err(FetchError::InvalidDate { .. })));
    }
}

mod intraday_reads {
    use super::*;

    fn fetcher() -> IntradayFetcher {
        IntradayFetcher::new(
            context(Arc::new(seeded_store()), "kmin"),
            Arc::new(IntradayClock::parse(SLOTS).unwrap()),
            FetchOptions::default(),
        )
    }

    #[test]
    fn intervals_carry_over_weekend() {
        let f = fetcher();
        let frame = f
            .fetch_intervals("close", "20140106", "0930", Some(2), -1, &OptionOverrides::none())
            .unwrap();
        let t = frame.as_table().unwrap();
        let labels: Vec<String> = t.index.iter().map(|l| l.to_string()).collect();
        assert_eq!(labels, vec!["2014-01-03 14:30:00", "2014-01-03 15:00:00"]);
        assert_eq!(t.column("000001").unwrap(), vec![Some(208.0), Some(209.0)]);
    }

    #[test]
    fn intervals_past_calendar_end() {
        let f = fetcher();
        let result =
            f.fetch_intervals("close", "20140115", "1500", Some(1), 1, &OptionOverrides::none());
        assert!(matches!(result, Err(FetchError::OutOfRange { .. })));
    }

    #[test]
    fn single_slot_history_is_table() {
        let f = fetcher();
        let frame = f
            .fetch_history(
                &IntradayRequest::one("close", "1000"),
                "20140108",
                2,
                &OptionOverrides::none().reindex(true),
            )
            .unwrap();
        let t = frame.as_table().unwrap();
        assert_eq!(t.index, vec![Label::from("20140106"), Label::from("20140107")]);
        assert_eq!(t.columns, dates(&UNIVERSE));
        assert_eq!(t.get(&Label::from("20140107"), "000001"), Some(401.0));
    }
}

mod record_reads {
    use super::*;

    fn fetcher() -> RecordFetcher {
        RecordFetcher::new(
            context(Arc::new(seeded_store()), "records"),
            FetchOptions::default(),
        )
    }

    #[test]
    fn daily_records_reindexed() {
        let f = fetcher();
        let t = f
            .fetch_daily(
                &dates(&["volume"]),
                "20140108",
                1,
                &OptionOverrides::none().reindex(true),
            )
            .unwrap();
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.columns, dates(&["volume"]));
        assert_eq!(t.get(&Label::from("000002"), "volume"), Some(4000.0));
        assert_eq!(t.get(&Label::from("600000"), "volume"), None);
    }

    #[test]
    fn record_windows_per_requested_date() {
        let f = fetcher();
        match f
            .fetch_dates(
                &dates(&["close"]),
                &dates(&["20140107", "20140110"]),
                1,
                1,
                &OptionOverrides::none(),
            )
            .unwrap()
        {
            RecordDates::Windows(ws) => {
                assert_eq!(ws.len(), 2);
                assert_eq!(ws[1].1.dates().len(), 3);
                assert_eq!(ws[1].1.len(), 6);
            }
            other => panic!("expected windows, got {other:?}"),
        }
    }
}

mod stored_universe {
    use super::*;

    #[test]
    fn universe_keeps_flagged_members() {
        let store = MemoryStore::new();
        store
            .upsert(
                "universe",
                Document::series("csi", "20140102", [("000001", 1.0), ("000002", 0.0), ("600000", 1.0)]),
            )
            .unwrap();
        let u = Universe::from_store(&store, "universe", "csi", "20140102").unwrap();
        assert_eq!(u.sids(), &["000001".to_string(), "600000".to_string()]);
    }
}

mod csv_round_trip {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn imported_series_are_fetchable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("turnover.csv");
        fs::write(
            &path,
            "date,sid,turnover\n20140106,000001,1.5\n20140107,000001,2.5\n20140107,600000,3.5\n",
        )
        .unwrap();

        let store = Arc::new(seeded_store());
        csv_adapter::import_file(store.as_ref(), "kday", &path, ImportLayout::Series).unwrap();
        let f = DayFetcher::new(context(store, "kday"), FetchOptions::default());
        let t = f
            .fetch("turnover", "20140106", Some("20140107"), 0, &OptionOverrides::none())
            .unwrap();
        assert_eq!(t.columns, dates(&["000001", "600000"]));
        assert_eq!(t.get(&Label::from("20140106"), "600000"), None);

        let mut out = Vec::new();
        csv_adapter::write_table(&mut out, &t).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "index,000001,600000\n20140106,1.5,\n20140107,2.5,3.5\n"
        );
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_parity {
    use super::*;
    use pitfetch::adapters::sqlite_adapter::SqliteStore;
    use pitfetch::ports::store_port::{DocumentStore, Projection, Query};

    #[test]
    fn sqlite_and_memory_agree() {
        let memory = seeded_store();
        let sqlite = SqliteStore::in_memory().unwrap();
        sqlite.initialize_schema().unwrap();
        for collection in ["dates", "kday", "kmin", "records"] {
            let docs = memory
                .find(collection, &Query::new(), &Projection::all())
                .unwrap();
            sqlite.upsert_many(collection, docs).unwrap();
        }

        let mem_fetcher = DayFetcher::new(context(Arc::new(memory), "kday"), FetchOptions::default());
        let sql_fetcher = DayFetcher::new(context(Arc::new(sqlite), "kday"), FetchOptions::default());
        let overrides = OptionOverrides::none().reindex(true);
        let requested = dates(&["20140107", "20140113"]);
        assert_eq!(
            mem_fetcher.fetch_dates("close", &requested, 1, 1, &overrides).unwrap(),
            sql_fetcher.fetch_dates("close", &requested, 1, 1, &overrides).unwrap()
        );
        assert_eq!(
            mem_fetcher.fetch_history("P", "20140110", 4, &overrides).unwrap(),
            sql_fetcher.fetch_history("P", "20140110", 4, &overrides).unwrap()
        );
    }

    #[test]
    fn nan_cell_imported_from_csv_reads_as_empty() {
        let sqlite = SqliteStore::in_memory().unwrap();
        sqlite.initialize_schema().unwrap();
        let docs = csv_adapter::read_series(
            "date,sid,close\n20140106,000001,NaN\n20140106,000002,2.0\n".as_bytes(),
        )
        .unwrap();
        sqlite.upsert_many("kday", docs).unwrap();

        let fetcher = DayFetcher::new(context(Arc::new(sqlite), "kday"), FetchOptions::default());
        let series = fetcher
            .fetch_daily("close", "20140106", 0, &OptionOverrides::none().reindex(true))
            .unwrap();
        assert_eq!(series.get("000001"), None);
        assert_eq!(series.get("000002"), Some(2.0));
    }
}
