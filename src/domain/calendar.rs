//! Trading calendar: the ordered set of trading-day labels every fetch is keyed by.

use crate::domain::error::FetchError;
use crate::ports::store_port::DocumentStore;
use std::ops::RangeInclusive;

/// Which neighbour to pick when a date is not a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Last trading day on or before the date (`-1`).
    Backward,
    /// First trading day on or after the date (`+1`).
    Forward,
}

impl Direction {
    pub fn from_sign(sign: i32) -> Self {
        if sign < 0 {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }
}

/// Strictly increasing sequence of `YYYYMMDD` trading-day labels.
///
/// Built once per process and shared read-only (usually behind an `Arc`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingCalendar {
    dates: Vec<String>,
}

impl TradingCalendar {
    pub fn new(dates: Vec<String>) -> Result<Self, FetchError> {
        if dates.is_empty() {
            return Err(FetchError::InvalidCalendar {
                reason: "calendar has no trading days".into(),
            });
        }
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(FetchError::InvalidCalendar {
                reason: format!("{} is not strictly after {}", pair[1], pair[0]),
            });
        }
        Ok(Self { dates })
    }

    /// Snapshot the distinct dates of a collection.
    pub fn from_store(store: &dyn DocumentStore, collection: &str) -> Result<Self, FetchError> {
        let mut dates = store.distinct_dates(collection)?;
        dates.sort();
        dates.dedup();
        tracing::info!(collection, days = dates.len(), "trading calendar loaded");
        Self::new(dates)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn first(&self) -> &str {
        &self.dates[0]
    }

    pub fn last(&self) -> &str {
        &self.dates[self.dates.len() - 1]
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.dates.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.dates
    }

    /// Labels at positions `range`, clipped to the calendar.
    pub fn slice(&self, range: RangeInclusive<usize>) -> &[String] {
        let (lo, hi) = range.into_inner();
        if lo > hi || lo >= self.dates.len() {
            return &[];
        }
        let hi = hi.min(self.dates.len() - 1);
        &self.dates[lo..=hi]
    }

    /// Exact position of a trading day.
    pub fn position(&self, date: &str) -> Option<usize> {
        self.dates.binary_search_by(|d| d.as_str().cmp(date)).ok()
    }

    pub fn contains(&self, date: &str) -> bool {
        self.position(date).is_some()
    }

    /// Resolve `date` to `(index, trading_day)`, falling back to the neighbour in `direction`.
    pub fn resolve(&self, date: &str, direction: Direction) -> Result<(usize, &str), FetchError> {
        let index = match self.dates.binary_search_by(|d| d.as_str().cmp(date)) {
            Ok(i) => i,
            Err(insert) => match direction {
                Direction::Backward if insert == 0 => {
                    return Err(FetchError::out_of_range(format!(
                        "no trading day on or before {date} (calendar starts {})",
                        self.first()
                    )));
                }
                Direction::Backward => insert - 1,
                Direction::Forward if insert == self.dates.len() => {
                    return Err(FetchError::out_of_range(format!(
                        "no trading day on or after {date} (calendar ends {})",
                        self.last()
                    )));
                }
                Direction::Forward => insert,
            },
        };
        Ok((index, &self.dates[index]))
    }
}
