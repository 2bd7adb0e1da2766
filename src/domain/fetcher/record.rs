//! Record collections: one document per `(date, sid)` carrying many series.

use super::{
    daily_window, date_label, history_range, plan_dates, range_window, warn_empty, FetchContext,
    Fetcher,
};
use crate::domain::assemble::{collect_skipping, stack_tables};
use crate::domain::error::FetchError;
use crate::domain::options::{FetchOptions, OptionOverrides};
use crate::domain::table::{Cell, Label, Panel, RecordFrame, Table};
use crate::ports::store_port::{Projection, Query};
use std::collections::BTreeSet;

/// Multi-date record result: a `date x sid x series` block when each date is
/// a single day, otherwise one record frame per requested date.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordDates {
    Panel(Panel),
    Windows(Vec<(Label, RecordFrame)>),
}

pub struct RecordFetcher {
    ctx: FetchContext,
    options: FetchOptions,
}

impl RecordFetcher {
    pub fn new(ctx: FetchContext, options: FetchOptions) -> Self {
        Self { ctx, options }
    }

    fn universe_labels(&self) -> Vec<Label> {
        self.ctx
            .universe
            .sids()
            .iter()
            .map(|s| Label::from(s.as_str()))
            .collect()
    }

    fn read_window(
        &self,
        dnames: &[String],
        window: &[String],
        opts: &FetchOptions,
    ) -> Result<RecordFrame, FetchError> {
        let what = dnames.join(",");
        let mut docs = match (window.first(), window.last()) {
            (Some(first), Some(last)) => {
                tracing::debug!(
                    collection = %self.ctx.collection,
                    dnames = %what,
                    start = %first,
                    end = %last,
                    "record query"
                );
                let query = Query::new().date_between(first, last);
                self.ctx
                    .store
                    .find(&self.ctx.collection, &query, &Projection::fields(dnames))?
            }
            _ => Vec::new(),
        };
        docs.retain(|d| d.sid.is_some() && window.binary_search(&d.date).is_ok());
        docs.sort_by(|a, b| (&a.date, &a.sid).cmp(&(&b.date, &b.sid)));
        if docs.is_empty() {
            warn_empty(&self.ctx.collection, &what, window);
        }

        let columns: Vec<String> = if dnames.is_empty() {
            docs.iter()
                .flat_map(|d| d.dvalue.keys().cloned())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            dnames.to_vec()
        };
        let (index, rows): (Vec<(Label, String)>, Vec<Vec<Cell>>) = docs
            .iter()
            .map(|d| {
                let key = (
                    Label::from(d.date.as_str()),
                    d.sid.clone().unwrap_or_default(),
                );
                let row = columns
                    .iter()
                    .map(|c| d.dvalue.get(c).copied())
                    .collect::<Vec<Cell>>();
                (key, row)
            })
            .unzip();

        let frame = RecordFrame::new(index, columns, rows);
        let frame = if opts.reindex {
            frame.reindex_sids(self.ctx.universe.sids())
        } else {
            frame
        };
        Ok(if opts.datetime_index {
            frame.with_chronological_dates()
        } else {
            frame
        })
    }

    /// `sid x series` table of one day.
    fn section(&self, frame: &RecordFrame, date: &Label, opts: &FetchOptions) -> Table {
        let table = frame.cross_section(date);
        if opts.reindex {
            table.reindex_rows(&self.universe_labels())
        } else {
            table
        }
    }
}

impl Fetcher for RecordFetcher {
    type Request = [String];
    type Window = RecordFrame;
    type Daily = Table;
    type Dates = RecordDates;

    fn context(&self) -> &FetchContext {
        &self.ctx
    }

    fn options(&self) -> &FetchOptions {
        &self.options
    }

    fn fetch(
        &self,
        dnames: &[String],
        start: &str,
        end: Option<&str>,
        backdays: i64,
        overrides: &OptionOverrides,
    ) -> Result<RecordFrame, FetchError> {
        let opts = self.options.merge(overrides);
        let window = range_window(&self.ctx.calendar, &opts, start, end, backdays)?;
        self.read_window(dnames, window, &opts)
    }

    fn fetch_window(
        &self,
        dnames: &[String],
        window: &[String],
        overrides: &OptionOverrides,
    ) -> Result<RecordFrame, FetchError> {
        self.read_window(dnames, window, &self.options.merge(overrides))
    }

    fn fetch_history(
        &self,
        dnames: &[String],
        date: &str,
        backdays: usize,
        overrides: &OptionOverrides,
    ) -> Result<RecordFrame, FetchError> {
        let opts = self.options.merge(overrides);
        let window = history_range(&self.ctx.calendar, &opts, date, backdays)?;
        self.read_window(dnames, window, &opts)
    }

    fn fetch_daily(
        &self,
        dnames: &[String],
        date: &str,
        offset: i64,
        overrides: &OptionOverrides,
    ) -> Result<Table, FetchError> {
        let opts = self.options.merge(&overrides.delay(offset));
        let window = daily_window(&self.ctx.calendar, &opts, date)?;
        let frame = self.read_window(dnames, window, &opts)?;
        Ok(self.section(&frame, &date_label(&window[0], &opts), &opts))
    }

    fn fetch_dates(
        &self,
        dnames: &[String],
        dates: &[String],
        lshift: usize,
        rshift: usize,
        overrides: &OptionOverrides,
    ) -> Result<RecordDates, FetchError> {
        let opts = self.options.merge(overrides);
        let calendar = &self.ctx.calendar;
        let plans = plan_dates(calendar, &opts, dates, lshift, rshift);

        if lshift + rshift == 0 {
            let parts = collect_skipping(&plans, |plan| {
                let frame = self.read_window(dnames, plan.window(calendar), &opts)?;
                Ok(self.section(&frame, &date_label(plan.date(calendar), &opts), &opts))
            })?;
            Ok(RecordDates::Panel(stack_tables(parts)))
        } else {
            let parts = collect_skipping(&plans, |plan| {
                self.read_window(dnames, plan.window(calendar), &opts)
            })?;
            Ok(RecordDates::Windows(parts))
        }
    }
}
