//! Intraday series: one `sid -> value` document per `(dname, date, slot)`.
//!
//! A window read produces a `slot x date x sid` block. A single-slot request
//! collapses it to that slot's `date x sid` table; `as_frame` flattens it
//! into one timestamp-indexed table.

use super::{
    daily_window, date_label, history_range, plan_dates, range_window, warn_empty, FetchContext,
    Fetcher,
};
use crate::domain::assemble::{collect_skipping, stack_series, stack_tables};
use crate::domain::calendar::Direction;
use crate::domain::clock::IntradayClock;
use crate::domain::dateutil::normalize;
use crate::domain::error::FetchError;
use crate::domain::options::{FetchOptions, OptionOverrides};
use crate::domain::table::{Frame, Label, Panel, Series, Table};
use crate::ports::store_port::{Document, Projection, Query};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotSelection {
    One(String),
    Many(Vec<String>),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntradayRequest {
    pub dname: String,
    pub slots: SlotSelection,
    pub as_frame: bool,
}

impl IntradayRequest {
    pub fn new(dname: &str, slots: SlotSelection) -> Self {
        Self {
            dname: dname.to_string(),
            slots,
            as_frame: false,
        }
    }

    pub fn one(dname: &str, slot: &str) -> Self {
        Self::new(dname, SlotSelection::One(slot.to_string()))
    }

    pub fn all(dname: &str) -> Self {
        Self::new(dname, SlotSelection::All)
    }

    pub fn as_frame(mut self, as_frame: bool) -> Self {
        self.as_frame = as_frame;
        self
    }

    fn is_single(&self) -> bool {
        matches!(self.slots, SlotSelection::One(_))
    }
}

pub struct IntradayFetcher {
    ctx: FetchContext,
    clock: Arc<IntradayClock>,
    options: FetchOptions,
}

impl IntradayFetcher {
    pub fn new(ctx: FetchContext, clock: Arc<IntradayClock>, options: FetchOptions) -> Self {
        Self {
            ctx,
            clock,
            options,
        }
    }

    pub fn clock(&self) -> &IntradayClock {
        &self.clock
    }

    /// Requested slots in clock order. Unknown slots are out of range and an
    /// empty list selects every slot.
    fn resolve_slots(&self, selection: &SlotSelection) -> Result<Vec<String>, FetchError> {
        let requested: Vec<&String> = match selection {
            SlotSelection::All => return Ok(self.clock.slots().to_vec()),
            SlotSelection::Many(slots) if slots.is_empty() => return Ok(self.clock.slots().to_vec()),
            SlotSelection::One(slot) => vec![slot],
            SlotSelection::Many(slots) => slots.iter().collect(),
        };
        if let Some(unknown) = requested.iter().find(|s| self.clock.index_of(s).is_none()) {
            return Err(FetchError::out_of_range(format!("unknown intraday slot {unknown}")));
        }
        Ok(self
            .clock
            .slots()
            .iter()
            .filter(|s| requested.contains(s))
            .cloned()
            .collect())
    }

    fn query(
        &self,
        dname: &str,
        first: &str,
        last: &str,
        slots: &[String],
    ) -> Result<Vec<Document>, FetchError> {
        tracing::debug!(
            collection = %self.ctx.collection,
            dname,
            start = first,
            end = last,
            slots = slots.len(),
            "intraday query"
        );
        let query = Query::new()
            .dname_eq(dname)
            .date_between(first, last)
            .time_in(slots);
        self.ctx
            .store
            .find(&self.ctx.collection, &query, &Projection::all())
    }

    fn format(&self, panel: Panel, opts: &FetchOptions) -> Panel {
        let panel = if opts.datetime_index {
            panel.with_chronological_major()
        } else {
            panel
        };
        if opts.reindex {
            panel.reindex_minor(self.ctx.universe.sids())
        } else {
            panel
        }
    }

    /// The `slot x date x sid` block for a window, one item per requested slot.
    fn read_block(
        &self,
        dname: &str,
        window: &[String],
        slots: &[String],
        opts: &FetchOptions,
    ) -> Result<Panel, FetchError> {
        let docs = match (window.first(), window.last()) {
            (Some(first), Some(last)) => {
                let mut docs = self.query(dname, first, last, slots)?;
                docs.retain(|d| window.binary_search(&d.date).is_ok());
                docs.sort_by(|a, b| a.date.cmp(&b.date));
                docs
            }
            _ => Vec::new(),
        };
        if docs.is_empty() {
            warn_empty(&self.ctx.collection, dname, window);
        }

        let parts = slots
            .iter()
            .map(|slot| {
                let table = Table::from_row_maps(
                    docs.iter()
                        .filter(|d| d.time.as_deref() == Some(slot.as_str()))
                        .map(|d| (Label::from(d.date.as_str()), &d.dvalue)),
                );
                (Label::from(slot.as_str()), table)
            })
            .collect();
        Ok(self.format(Panel::from_tables(parts), opts))
    }

    fn shape_window(&self, panel: Panel, request: &IntradayRequest) -> Frame {
        if request.is_single() {
            let table = panel.tables().next().map(|(_, t)| t.clone()).unwrap_or_default();
            Frame::Table(table)
        } else if request.as_frame {
            Frame::Table(panel.to_frame())
        } else {
            Frame::Panel(panel)
        }
    }

    /// The `slot x sid` cross-section of a block at one date.
    fn slot_section(panel: &Panel, date: &Label) -> Table {
        panel
            .major_xs(date)
            .unwrap_or_else(|| Table::blank(panel.items.clone(), panel.minor.clone()))
    }

    fn read_window(
        &self,
        request: &IntradayRequest,
        window: &[String],
        opts: &FetchOptions,
    ) -> Result<Frame, FetchError> {
        let slots = self.resolve_slots(&request.slots)?;
        let panel = self.read_block(&request.dname, window, &slots, opts)?;
        Ok(self.shape_window(panel, request))
    }

    /// `num` consecutive slots ending `offset` slots from `(date, slot)`.
    ///
    /// Rows are exactly the generated coordinates, labelled by timestamp;
    /// coordinates without a stored document are empty rows. Without `num`
    /// the single coordinate is returned as a series.
    pub fn fetch_intervals(
        &self,
        dname: &str,
        date: &str,
        slot: &str,
        num: Option<usize>,
        offset: i64,
        overrides: &OptionOverrides,
    ) -> Result<Frame, FetchError> {
        let opts = self.options.merge(overrides);
        let date = normalize(date, Direction::Backward, opts.date_check)?;
        let coords =
            self.clock
                .coordinates(&self.ctx.calendar, &date, slot, num.unwrap_or(1), offset)?;

        let (Some((first, _)), Some((last, _))) = (coords.first(), coords.last()) else {
            return Ok(Frame::Table(Table::empty()));
        };
        let slots: Vec<String> = self
            .clock
            .slots()
            .iter()
            .filter(|s| coords.iter().any(|(_, t)| t == *s))
            .cloned()
            .collect();
        let docs = self.query(dname, first, last, &slots)?;
        let by_coord: HashMap<(&str, &str), &Document> = docs
            .iter()
            .filter_map(|d| Some(((d.date.as_str(), d.time.as_deref()?), d)))
            .collect();

        let labels: Vec<Label> = coords
            .iter()
            .map(|(d, t)| Label::join(&Label::from(d.as_str()), t))
            .collect();
        let present = coords.iter().zip(&labels).filter_map(|((d, t), label)| {
            by_coord
                .get(&(d.as_str(), t.as_str()))
                .map(|doc| (label.clone(), &doc.dvalue))
        });
        let table = Table::from_row_maps(present);
        if table.is_empty() {
            warn_empty(&self.ctx.collection, dname, &[first.clone(), last.clone()]);
        }
        let table = table.reindex_rows(&labels);
        let table = if opts.reindex {
            table.reindex_columns(self.ctx.universe.sids())
        } else {
            table
        };

        match num {
            Some(_) => Ok(Frame::Table(table)),
            None => Ok(Frame::Series(
                table
                    .row(0)
                    .unwrap_or_else(|| Series::empty(Some(labels[0].clone()), table.columns.clone())),
            )),
        }
    }
}

impl Fetcher for IntradayFetcher {
    type Request = IntradayRequest;
    type Window = Frame;
    type Daily = Frame;
    type Dates = Frame;

    fn context(&self) -> &FetchContext {
        &self.ctx
    }

    fn options(&self) -> &FetchOptions {
        &self.options
    }

    fn fetch(
        &self,
        request: &IntradayRequest,
        start: &str,
        end: Option<&str>,
        backdays: i64,
        overrides: &OptionOverrides,
    ) -> Result<Frame, FetchError> {
        let opts = self.options.merge(overrides);
        let window = range_window(&self.ctx.calendar, &opts, start, end, backdays)?;
        self.read_window(request, window, &opts)
    }

    fn fetch_window(
        &self,
        request: &IntradayRequest,
        window: &[String],
        overrides: &OptionOverrides,
    ) -> Result<Frame, FetchError> {
        self.read_window(request, window, &self.options.merge(overrides))
    }

    fn fetch_history(
        &self,
        request: &IntradayRequest,
        date: &str,
        backdays: usize,
        overrides: &OptionOverrides,
    ) -> Result<Frame, FetchError> {
        let opts = self.options.merge(overrides);
        let window = history_range(&self.ctx.calendar, &opts, date, backdays)?;
        self.read_window(request, window, &opts)
    }

    /// One slot gives a sid series; several give a `slot x sid` table, or a
    /// timestamp-indexed table with `as_frame`.
    fn fetch_daily(
        &self,
        request: &IntradayRequest,
        date: &str,
        offset: i64,
        overrides: &OptionOverrides,
    ) -> Result<Frame, FetchError> {
        let opts = self.options.merge(&overrides.delay(offset));
        let window = daily_window(&self.ctx.calendar, &opts, date)?;
        let slots = self.resolve_slots(&request.slots)?;
        let panel = self.read_block(&request.dname, window, &slots, &opts)?;
        let day = date_label(&window[0], &opts);

        if request.is_single() {
            let section = Self::slot_section(&panel, &day);
            let series = section
                .row(0)
                .map(|mut s| {
                    s.name = Some(day.clone());
                    s
                })
                .unwrap_or_else(|| Series::empty(Some(day), panel.minor.clone()));
            Ok(Frame::Series(series))
        } else if request.as_frame {
            Ok(Frame::Table(panel.to_frame()))
        } else {
            Ok(Frame::Table(Self::slot_section(&panel, &day)))
        }
    }

    fn fetch_dates(
        &self,
        request: &IntradayRequest,
        dates: &[String],
        lshift: usize,
        rshift: usize,
        overrides: &OptionOverrides,
    ) -> Result<Frame, FetchError> {
        let opts = self.options.merge(overrides);
        let calendar = &self.ctx.calendar;
        let slots = self.resolve_slots(&request.slots)?;
        let plans = plan_dates(calendar, &opts, dates, lshift, rshift);
        let single = request.is_single();

        if lshift + rshift == 0 {
            if single {
                let parts = collect_skipping(&plans, |plan| {
                    let panel = self.read_block(&request.dname, plan.window(calendar), &slots, &opts)?;
                    let day = date_label(plan.date(calendar), &opts);
                    let section = Self::slot_section(&panel, &day);
                    Ok(section
                        .row(0)
                        .unwrap_or_else(|| Series::empty(None, panel.minor.clone())))
                })?;
                return Ok(Frame::Table(stack_series(parts)));
            }
            let parts = collect_skipping(&plans, |plan| {
                let panel = self.read_block(&request.dname, plan.window(calendar), &slots, &opts)?;
                Ok(Self::slot_section(&panel, &date_label(plan.date(calendar), &opts)))
            })?;
            return Ok(Frame::Panel(stack_tables(parts)));
        }

        let parts = collect_skipping(&plans, |plan| {
            let panel = self.read_block(&request.dname, plan.window(calendar), &slots, &opts)?;
            Ok(if single {
                panel.tables().next().map(|(_, t)| t.clone()).unwrap_or_default()
            } else {
                panel.to_frame()
            })
        })?;
        Ok(Frame::Panel(stack_tables(parts)))
    }
}
