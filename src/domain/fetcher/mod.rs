//! Calendar-relative fetchers.
//!
//! Every variant implements the same five operations. All of them reduce a
//! request to a window of trading days and then issue exactly one store query
//! per window through `fetch_window`:
//!
//! - `fetch`: `[start, end]` shifted by `backdays` ([`cut_window`])
//! - `fetch_history`: `backdays` days ending `delay` days before a date ([`history_window`])
//! - `fetch_daily`: `fetch_history` with one day and `delay = offset`
//! - `fetch_dates`: independent per-date windows, out-of-range dates skipped
//!
//! The variants differ in row shape: [`DayFetcher`] reads one `sid -> value`
//! map per date, [`IntradayFetcher`] one per `(date, slot)`, and
//! [`RecordFetcher`] one row per `(date, sid)` carrying many series.

pub mod day;
pub mod intraday;
pub mod record;

pub use day::DayFetcher;
pub use intraday::{IntradayFetcher, IntradayRequest, SlotSelection};
pub use record::{RecordDates, RecordFetcher};

use crate::domain::assemble::Planned;
use crate::domain::calendar::{Direction, TradingCalendar};
use crate::domain::dateutil::{cut_window, history_window, normalize};
use crate::domain::error::FetchError;
use crate::domain::options::{FetchOptions, OptionOverrides};
use crate::domain::table::Label;
use crate::domain::universe::Universe;
use crate::ports::store_port::DocumentStore;
use std::sync::Arc;

/// Shared, read-only collaborators of a fetcher.
#[derive(Clone)]
pub struct FetchContext {
    pub calendar: Arc<TradingCalendar>,
    pub universe: Arc<Universe>,
    pub store: Arc<dyn DocumentStore + Send + Sync>,
    pub collection: String,
}

impl FetchContext {
    pub fn new(
        calendar: Arc<TradingCalendar>,
        universe: Arc<Universe>,
        store: Arc<dyn DocumentStore + Send + Sync>,
        collection: &str,
    ) -> Self {
        Self {
            calendar,
            universe,
            store,
            collection: collection.to_string(),
        }
    }
}

pub trait Fetcher {
    /// What to fetch: a series name, a list of names, or a series plus slots.
    type Request: ?Sized;
    /// Result of a windowed read.
    type Window;
    /// Result of a single-coordinate read.
    type Daily;
    /// Result of a multi-date read.
    type Dates;

    fn context(&self) -> &FetchContext;

    fn options(&self) -> &FetchOptions;

    fn fetch(
        &self,
        request: &Self::Request,
        start: &str,
        end: Option<&str>,
        backdays: i64,
        overrides: &OptionOverrides,
    ) -> Result<Self::Window, FetchError>;

    fn fetch_window(
        &self,
        request: &Self::Request,
        window: &[String],
        overrides: &OptionOverrides,
    ) -> Result<Self::Window, FetchError>;

    fn fetch_history(
        &self,
        request: &Self::Request,
        date: &str,
        backdays: usize,
        overrides: &OptionOverrides,
    ) -> Result<Self::Window, FetchError>;

    fn fetch_daily(
        &self,
        request: &Self::Request,
        date: &str,
        offset: i64,
        overrides: &OptionOverrides,
    ) -> Result<Self::Daily, FetchError>;

    fn fetch_dates(
        &self,
        request: &Self::Request,
        dates: &[String],
        lshift: usize,
        rshift: usize,
        overrides: &OptionOverrides,
    ) -> Result<Self::Dates, FetchError>;
}

/// A requested date that resolved inside the calendar with room for its shifts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePlan {
    pub requested: Label,
    pub position: usize,
    pub lshift: usize,
    pub rshift: usize,
}

impl DatePlan {
    pub fn window<'a>(&self, calendar: &'a TradingCalendar) -> &'a [String] {
        calendar.slice(self.position - self.lshift..=self.position + self.rshift)
    }

    pub fn date<'a>(&self, calendar: &'a TradingCalendar) -> &'a str {
        &calendar.as_slice()[self.position]
    }
}

impl Planned for DatePlan {
    fn label(&self) -> &Label {
        &self.requested
    }
}

pub(crate) fn date_label(date: &str, opts: &FetchOptions) -> Label {
    let label = Label::from(date);
    if opts.datetime_index {
        label.to_chronological()
    } else {
        label
    }
}

pub(crate) fn range_window<'a>(
    calendar: &'a TradingCalendar,
    opts: &FetchOptions,
    start: &str,
    end: Option<&str>,
    backdays: i64,
) -> Result<&'a [String], FetchError> {
    let start = normalize(start, Direction::Backward, opts.date_check)?;
    let end = end
        .map(|e| normalize(e, Direction::Forward, opts.date_check))
        .transpose()?;
    Ok(cut_window(calendar, &start, end.as_deref(), backdays))
}

pub(crate) fn history_range<'a>(
    calendar: &'a TradingCalendar,
    opts: &FetchOptions,
    date: &str,
    backdays: usize,
) -> Result<&'a [String], FetchError> {
    let date = normalize(date, Direction::Backward, opts.date_check)?;
    history_window(calendar, &date, backdays, opts.delay)
}

/// The one-day window of a daily read; empty means the offset left the calendar.
pub(crate) fn daily_window<'a>(
    calendar: &'a TradingCalendar,
    opts: &FetchOptions,
    date: &str,
) -> Result<&'a [String], FetchError> {
    let window = history_range(calendar, opts, date, 1)?;
    if window.is_empty() {
        return Err(FetchError::out_of_range(format!(
            "{date} shifted by {} trading days is outside the calendar",
            opts.delay
        )));
    }
    Ok(window)
}

/// Resolve requested dates, keeping those whose shifted window fits.
///
/// Dates that fail to resolve or validate are dropped with a warning; the
/// surviving plans keep the caller's order.
pub fn plan_dates(
    calendar: &TradingCalendar,
    opts: &FetchOptions,
    dates: &[String],
    lshift: usize,
    rshift: usize,
) -> Vec<DatePlan> {
    let mut plans = Vec::with_capacity(dates.len());
    for raw in dates {
        let resolved = normalize(raw, Direction::Backward, opts.date_check).and_then(|date| {
            let (position, _) = calendar.resolve(&date, Direction::Backward)?;
            Ok((date, position))
        });
        let (date, position) = match resolved {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(requested = %raw, error = %e, "skipping date");
                continue;
            }
        };
        if position < lshift || position + rshift + 1 > calendar.len() {
            tracing::warn!(
                requested = %raw,
                lshift,
                rshift,
                "skipping date: shifted window leaves the calendar"
            );
            continue;
        }
        plans.push(DatePlan {
            requested: date_label(&date, opts),
            position,
            lshift,
            rshift,
        });
    }
    plans
}

pub(crate) fn warn_empty(collection: &str, what: &str, window: &[String]) {
    tracing::warn!(
        collection,
        request = what,
        start = window.first().map(String::as_str).unwrap_or(""),
        end = window.last().map(String::as_str).unwrap_or(""),
        "empty result"
    );
}
