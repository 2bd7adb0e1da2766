//! Daily series: one `sid -> value` document per `(dname, date)`.

use super::{
    daily_window, date_label, history_range, plan_dates, range_window, warn_empty, FetchContext,
    Fetcher,
};
use crate::domain::assemble::{collect_skipping, stack_series, stack_tables};
use crate::domain::error::FetchError;
use crate::domain::options::{FetchOptions, OptionOverrides};
use crate::domain::table::{Frame, Label, Series, Table};
use crate::ports::store_port::{Projection, Query};

pub struct DayFetcher {
    ctx: FetchContext,
    options: FetchOptions,
}

impl DayFetcher {
    pub fn new(ctx: FetchContext, options: FetchOptions) -> Self {
        Self { ctx, options }
    }

    fn format(&self, table: Table, opts: &FetchOptions) -> Table {
        let table = if opts.datetime_index {
            table.with_chronological_index()
        } else {
            table
        };
        if opts.reindex {
            table.reindex_columns(self.ctx.universe.sids())
        } else {
            table
        }
    }

    fn read_window(&self, dname: &str, window: &[String], opts: &FetchOptions) -> Result<Table, FetchError> {
        let (Some(first), Some(last)) = (window.first(), window.last()) else {
            warn_empty(&self.ctx.collection, dname, window);
            return Ok(self.format(Table::empty(), opts));
        };
        tracing::debug!(
            collection = %self.ctx.collection,
            dname,
            start = %first,
            end = %last,
            "day query"
        );
        let query = Query::new().dname_eq(dname).date_between(first, last);
        let mut docs = self
            .ctx
            .store
            .find(&self.ctx.collection, &query, &Projection::all())?;
        docs.retain(|d| window.binary_search(&d.date).is_ok());
        docs.sort_by(|a, b| a.date.cmp(&b.date));
        if docs.is_empty() {
            warn_empty(&self.ctx.collection, dname, window);
        }

        let table = Table::from_row_maps(
            docs.iter()
                .map(|d| (Label::from(d.date.as_str()), &d.dvalue)),
        );
        Ok(self.format(table, opts))
    }

    /// First row of a one-day table, or an empty series over its columns.
    fn single_row(table: &Table, date: &Label) -> Series {
        table
            .row(0)
            .unwrap_or_else(|| Series::empty(Some(date.clone()), table.columns.clone()))
    }
}

impl Fetcher for DayFetcher {
    type Request = str;
    type Window = Table;
    type Daily = Series;
    type Dates = Frame;

    fn context(&self) -> &FetchContext {
        &self.ctx
    }

    fn options(&self) -> &FetchOptions {
        &self.options
    }

    fn fetch(
        &self,
        dname: &str,
        start: &str,
        end: Option<&str>,
        backdays: i64,
        overrides: &OptionOverrides,
    ) -> Result<Table, FetchError> {
        let opts = self.options.merge(overrides);
        let window = range_window(&self.ctx.calendar, &opts, start, end, backdays)?;
        self.read_window(dname, window, &opts)
    }

    fn fetch_window(
        &self,
        dname: &str,
        window: &[String],
        overrides: &OptionOverrides,
    ) -> Result<Table, FetchError> {
        self.read_window(dname, window, &self.options.merge(overrides))
    }

    fn fetch_history(
        &self,
        dname: &str,
        date: &str,
        backdays: usize,
        overrides: &OptionOverrides,
    ) -> Result<Table, FetchError> {
        let opts = self.options.merge(overrides);
        let window = history_range(&self.ctx.calendar, &opts, date, backdays)?;
        self.read_window(dname, window, &opts)
    }

    fn fetch_daily(
        &self,
        dname: &str,
        date: &str,
        offset: i64,
        overrides: &OptionOverrides,
    ) -> Result<Series, FetchError> {
        let opts = self.options.merge(&overrides.delay(offset));
        let window = daily_window(&self.ctx.calendar, &opts, date)?;
        let table = self.read_window(dname, window, &opts)?;
        Ok(Self::single_row(&table, &date_label(&window[0], &opts)))
    }

    fn fetch_dates(
        &self,
        dname: &str,
        dates: &[String],
        lshift: usize,
        rshift: usize,
        overrides: &OptionOverrides,
    ) -> Result<Frame, FetchError> {
        let opts = self.options.merge(overrides);
        let calendar = &self.ctx.calendar;
        let plans = plan_dates(calendar, &opts, dates, lshift, rshift);

        if lshift + rshift == 0 {
            let parts = collect_skipping(&plans, |plan| {
                let table = self.read_window(dname, plan.window(calendar), &opts)?;
                Ok(Self::single_row(&table, &plan.requested))
            })?;
            Ok(Frame::Table(stack_series(parts)))
        } else {
            let parts = collect_skipping(&plans, |plan| {
                self.read_window(dname, plan.window(calendar), &opts)
            })?;
            Ok(Frame::Panel(stack_tables(parts)))
        }
    }
}
