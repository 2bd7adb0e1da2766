#![allow(dead_code)]

use pitfetch::adapters::memory_adapter::MemoryStore;
use pitfetch::domain::calendar::TradingCalendar;
use pitfetch::domain::error::FetchError;
use pitfetch::domain::fetcher::FetchContext;
use pitfetch::domain::universe::Universe;
use pitfetch::ports::store_port::{Document, DocumentStore, DocumentWriter, Projection, Query};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Ten trading days of January 2014; the 1st, 4th, 5th, 11th and 12th are closed.
pub const TRADING_DAYS: [&str; 10] = [
    "20140102", "20140103", "20140106", "20140107", "20140108", "20140109", "20140110",
    "20140113", "20140114", "20140115",
];

pub const SLOTS: &str = "0930,1000,1030,1100,1130,1300,1330,1400,1430,1500";

pub const UNIVERSE: [&str; 3] = ["000001", "000002", "600000"];

pub fn calendar() -> TradingCalendar {
    TradingCalendar::new(TRADING_DAYS.iter().map(|d| d.to_string()).collect()).unwrap()
}

pub fn universe() -> Universe {
    Universe::new(UNIVERSE.iter().map(|s| s.to_string()).collect()).unwrap()
}

/// Value of sid `000001` on the `n`th trading day (1-based); `000002` holds ten times that.
pub fn close_of(n: usize) -> f64 {
    n as f64
}

/// A store holding:
/// - `dates`: one calendar marker per trading day
/// - `kday`: `close` for 000001 and 000002 on every day, `P` on the fifth day only
/// - `kmin`: `close` at every slot, sid 000001 = `day * 100 + slot index`
/// - `records`: `close`/`volume` for 000001 and 000002 on every day
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    let slots: Vec<&str> = SLOTS.split(',').collect();
    for (i, date) in TRADING_DAYS.iter().enumerate() {
        let n = i + 1;
        store
            .upsert("dates", Document::series("calendar", date, [("open", 1.0)]))
            .unwrap();
        store
            .upsert(
                "kday",
                Document::series(
                    "close",
                    date,
                    [("000001", close_of(n)), ("000002", 10.0 * close_of(n))],
                ),
            )
            .unwrap();
        for (s, slot) in slots.iter().enumerate() {
            store
                .upsert(
                    "kmin",
                    Document::interval("close", date, slot, [("000001", (n * 100 + s) as f64)]),
                )
                .unwrap();
        }
        for sid in ["000001", "000002"] {
            store
                .upsert(
                    "records",
                    Document::record(
                        date,
                        sid,
                        [("close", close_of(n)), ("volume", 1000.0 * close_of(n))],
                    ),
                )
                .unwrap();
        }
    }
    store
        .upsert(
            "kday",
            Document::series("P", TRADING_DAYS[4], [("000001", 10.0), ("000002", 20.0)]),
        )
        .unwrap();
    store
}

pub fn context<S>(store: Arc<S>, collection: &str) -> FetchContext
where
    S: DocumentStore + Send + Sync + 'static,
{
    FetchContext::new(
        Arc::new(calendar()),
        Arc::new(universe()),
        store,
        collection,
    )
}

/// Wraps a store and counts `find` calls.
pub struct CountingStore<S> {
    pub inner: S,
    finds: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            finds: AtomicUsize::new(0),
        }
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }
}

impl<S: DocumentStore> DocumentStore for CountingStore<S> {
    fn find(
        &self,
        collection: &str,
        query: &Query,
        projection: &Projection,
    ) -> Result<Vec<Document>, FetchError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(collection, query, projection)
    }

    fn distinct_dates(&self, collection: &str) -> Result<Vec<String>, FetchError> {
        self.inner.distinct_dates(collection)
    }
}

/// A store whose every call fails as unreachable.
pub struct FailingStore;

impl DocumentStore for FailingStore {
    fn find(
        &self,
        _collection: &str,
        _query: &Query,
        _projection: &Projection,
    ) -> Result<Vec<Document>, FetchError> {
        Err(FetchError::Connectivity {
            reason: "connection refused".into(),
        })
    }

    fn distinct_dates(&self, _collection: &str) -> Result<Vec<String>, FetchError> {
        Err(FetchError::Connectivity {
            reason: "connection refused".into(),
        })
    }
}
