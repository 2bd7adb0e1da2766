//! CLI definition and dispatch.
//!
//! Every subcommand reads an INI config, opens the configured store and
//! writes its result as CSV on stdout. Diagnostics go to stderr.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::{self, ImportLayout};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::calendar::TradingCalendar;
use crate::domain::clock::IntradayClock;
use crate::domain::config_validation::validate_config;
use crate::domain::error::FetchError;
use crate::domain::fetcher::{
    range_window, DayFetcher, FetchContext, Fetcher, IntradayFetcher, IntradayRequest, RecordDates,
    RecordFetcher, SlotSelection,
};
use crate::domain::options::{FetchOptions, OptionOverrides};
use crate::domain::table::Frame;
use crate::domain::universe::{parse_sids, Universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{DocumentStore, DocumentWriter};

#[derive(Parser, Debug)]
#[command(name = "pitfetch", about = "Point-in-time retrieval of calendar-keyed time series")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Day,
    Intraday,
    Record,
}

/// What to read and from where.
#[derive(Args, Debug, Clone)]
pub struct Target {
    #[arg(short, long)]
    pub config: PathBuf,
    #[arg(long)]
    pub collection: String,
    #[arg(long, value_enum, default_value_t = Kind::Day)]
    pub kind: Kind,
    /// Series name; a comma list of series for records (empty for all)
    #[arg(long, default_value = "")]
    pub dname: String,
    /// Comma list of intraday slots (all slots when omitted)
    #[arg(long)]
    pub slots: Option<String>,
    #[arg(long)]
    pub as_frame: bool,
}

/// Per-call option overrides. Absent flags keep the configured defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct OverrideArgs {
    #[arg(long)]
    pub reindex: bool,
    #[arg(long)]
    pub datetime_index: bool,
    #[arg(long)]
    pub date_check: bool,
    #[arg(long, allow_hyphen_values = true)]
    pub delay: Option<i64>,
}

impl OverrideArgs {
    pub fn to_overrides(&self) -> OptionOverrides {
        let mut overrides = OptionOverrides::none();
        if self.reindex {
            overrides = overrides.reindex(true);
        }
        if self.datetime_index {
            overrides = overrides.datetime_index(true);
        }
        if self.date_check {
            overrides = overrides.date_check(true);
        }
        if let Some(delay) = self.delay {
            overrides = overrides.delay(delay);
        }
        overrides
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the trading days of a cut window
    Calendar {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        backdays: i64,
    },
    /// Fetch a `[start, end]` window shifted left by `backdays`
    Fetch {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        backdays: i64,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Fetch `backdays` trading days ending `delay` days before a date
    History {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        date: String,
        #[arg(long)]
        backdays: usize,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Fetch a single day `offset` trading days before a date
    Daily {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        date: String,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Fetch a shifted window around each of several dates
    Dates {
        #[command(flatten)]
        target: Target,
        #[arg(long, value_delimiter = ',')]
        dates: Vec<String>,
        #[arg(long, default_value_t = 0)]
        lshift: usize,
        #[arg(long, default_value_t = 0)]
        rshift: usize,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Fetch consecutive intraday slots ending `offset` slots from a coordinate
    Intervals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        collection: String,
        #[arg(long)]
        dname: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        slot: String,
        #[arg(long)]
        num: Option<usize>,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Load a CSV file into a collection
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        collection: String,
        #[arg(long)]
        file: PathBuf,
        /// Treat the file as `date,sid,<series>...` records
        #[arg(long)]
        records: bool,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn execute(command: Command) -> Result<(), FetchError> {
    let config_path = match &command {
        Command::Calendar { config, .. }
        | Command::Intervals { config, .. }
        | Command::Import { config, .. } => config,
        Command::Fetch { target, .. }
        | Command::History { target, .. }
        | Command::Daily { target, .. }
        | Command::Dates { target, .. } => &target.config,
    };
    let config = load_config(config_path)?;
    let store = open_store(&config)?;

    if let Command::Import {
        collection,
        file,
        records,
        ..
    } = &command
    {
        return run_import(store.as_ref(), collection, file, *records);
    }

    let session = Session::open(&config, store)?;
    let stdout = io::stdout();
    session.execute(&command, &mut stdout.lock())
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, FetchError> {
    let config = FileConfigAdapter::from_file(path)?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(feature = "sqlite")]
fn open_store(config: &dyn ConfigPort) -> Result<Arc<crate::adapters::sqlite_adapter::SqliteStore>, FetchError> {
    let store = crate::adapters::sqlite_adapter::SqliteStore::from_config(config)?;
    store.initialize_schema()?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
fn open_store(_config: &dyn ConfigPort) -> Result<Arc<crate::adapters::memory_adapter::MemoryStore>, FetchError> {
    Err(FetchError::Connectivity {
        reason: "sqlite feature is required for a persistent store".into(),
    })
}

pub fn run_import(
    store: &dyn DocumentWriter,
    collection: &str,
    file: &PathBuf,
    records: bool,
) -> Result<(), FetchError> {
    let layout = if records {
        ImportLayout::Records
    } else {
        ImportLayout::Series
    };
    csv_adapter::import_file(store, collection, file, layout)?;
    Ok(())
}

/// Parse a comma list, dropping blanks.
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn build_universe(config: &dyn ConfigPort, store: &dyn DocumentStore) -> Result<Universe, FetchError> {
    if let Some(sids) = config.get_string("universe", "sids") {
        return Ok(Universe::new(parse_sids(&sids)?)?);
    }
    let Some(collection) = config.get_string("universe", "collection") else {
        return Ok(Universe::default());
    };
    let missing = |key: &str| FetchError::ConfigMissing {
        section: "universe".into(),
        key: key.into(),
    };
    let dname = config.get_string("universe", "dname").ok_or_else(|| missing("dname"))?;
    let date = config.get_string("universe", "date").ok_or_else(|| missing("date"))?;
    Universe::from_store(store, &collection, &dname, &date)
}

pub fn build_clock(config: &dyn ConfigPort) -> Result<IntradayClock, FetchError> {
    let slots = config
        .get_string("intraday", "slots")
        .ok_or_else(|| FetchError::ConfigMissing {
            section: "intraday".into(),
            key: "slots".into(),
        })?;
    IntradayClock::parse(&slots)
}

pub fn intraday_request(target: &Target) -> IntradayRequest {
    let slots = match target.slots.as_deref().map(parse_list) {
        None => SlotSelection::All,
        Some(slots) if slots.is_empty() => SlotSelection::All,
        Some(mut slots) if slots.len() == 1 => SlotSelection::One(slots.remove(0)),
        Some(slots) => SlotSelection::Many(slots),
    };
    IntradayRequest::new(&target.dname, slots).as_frame(target.as_frame)
}

/// Calendar, universe and defaults shared by every fetch of one invocation.
pub struct Session {
    calendar: Arc<TradingCalendar>,
    universe: Arc<Universe>,
    store: Arc<dyn DocumentStore + Send + Sync>,
    options: FetchOptions,
    slots: Option<String>,
}

impl Session {
    pub fn open<S>(config: &dyn ConfigPort, store: Arc<S>) -> Result<Self, FetchError>
    where
        S: DocumentStore + Send + Sync + 'static,
    {
        let calendar_collection = config
            .get_string("calendar", "collection")
            .unwrap_or_else(|| "dates".to_string());
        let calendar = TradingCalendar::from_store(store.as_ref(), &calendar_collection)?;
        let universe = build_universe(config, store.as_ref())?;
        tracing::info!(
            days = calendar.len(),
            first = calendar.first(),
            last = calendar.last(),
            sids = universe.count(),
            "session ready"
        );
        Ok(Self {
            calendar: Arc::new(calendar),
            universe: Arc::new(universe),
            store,
            options: FetchOptions::from_config(config)?,
            slots: config.get_string("intraday", "slots"),
        })
    }

    pub fn calendar(&self) -> &TradingCalendar {
        &self.calendar
    }

    fn context(&self, collection: &str) -> FetchContext {
        FetchContext::new(
            Arc::clone(&self.calendar),
            Arc::clone(&self.universe),
            Arc::clone(&self.store),
            collection,
        )
    }

    fn day(&self, collection: &str) -> DayFetcher {
        DayFetcher::new(self.context(collection), self.options)
    }

    fn record(&self, collection: &str) -> RecordFetcher {
        RecordFetcher::new(self.context(collection), self.options)
    }

    fn intraday(&self, collection: &str) -> Result<IntradayFetcher, FetchError> {
        let slots = self.slots.as_deref().ok_or_else(|| FetchError::ConfigMissing {
            section: "intraday".into(),
            key: "slots".into(),
        })?;
        let clock = IntradayClock::parse(slots)?;
        Ok(IntradayFetcher::new(
            self.context(collection),
            Arc::new(clock),
            self.options,
        ))
    }

    /// Run a read-only subcommand, writing CSV to `out`.
    pub fn execute(&self, command: &Command, out: &mut dyn Write) -> Result<(), FetchError> {
        match command {
            Command::Calendar {
                start,
                end,
                backdays,
                ..
            } => {
                let window =
                    range_window(&self.calendar, &self.options, start, end.as_deref(), *backdays)?;
                for date in window {
                    writeln!(out, "{date}")?;
                }
                Ok(())
            }
            Command::Fetch {
                target,
                start,
                end,
                backdays,
                overrides,
            } => {
                let o = overrides.to_overrides();
                let end = end.as_deref();
                match target.kind {
                    Kind::Day => {
                        let t = self.day(&target.collection).fetch(&target.dname, start, end, *backdays, &o)?;
                        csv_adapter::write_table(out, &t)
                    }
                    Kind::Intraday => {
                        let f = self.intraday(&target.collection)?.fetch(
                            &intraday_request(target),
                            start,
                            end,
                            *backdays,
                            &o,
                        )?;
                        csv_adapter::write_frame(out, &f)
                    }
                    Kind::Record => {
                        let r = self.record(&target.collection).fetch(
                            &parse_list(&target.dname),
                            start,
                            end,
                            *backdays,
                            &o,
                        )?;
                        csv_adapter::write_records(out, &r)
                    }
                }
            }
            Command::History {
                target,
                date,
                backdays,
                overrides,
            } => {
                let o = overrides.to_overrides();
                match target.kind {
                    Kind::Day => {
                        let t = self.day(&target.collection).fetch_history(&target.dname, date, *backdays, &o)?;
                        csv_adapter::write_table(out, &t)
                    }
                    Kind::Intraday => {
                        let f = self.intraday(&target.collection)?.fetch_history(
                            &intraday_request(target),
                            date,
                            *backdays,
                            &o,
                        )?;
                        csv_adapter::write_frame(out, &f)
                    }
                    Kind::Record => {
                        let r = self.record(&target.collection).fetch_history(
                            &parse_list(&target.dname),
                            date,
                            *backdays,
                            &o,
                        )?;
                        csv_adapter::write_records(out, &r)
                    }
                }
            }
            Command::Daily {
                target,
                date,
                offset,
                overrides,
            } => {
                let o = overrides.to_overrides();
                let frame = match target.kind {
                    Kind::Day => Frame::Series(
                        self.day(&target.collection).fetch_daily(&target.dname, date, *offset, &o)?,
                    ),
                    Kind::Intraday => self.intraday(&target.collection)?.fetch_daily(
                        &intraday_request(target),
                        date,
                        *offset,
                        &o,
                    )?,
                    Kind::Record => Frame::Table(self.record(&target.collection).fetch_daily(
                        &parse_list(&target.dname),
                        date,
                        *offset,
                        &o,
                    )?),
                };
                csv_adapter::write_frame(out, &frame)
            }
            Command::Dates {
                target,
                dates,
                lshift,
                rshift,
                overrides,
            } => {
                let o = overrides.to_overrides();
                match target.kind {
                    Kind::Day => {
                        let f = self.day(&target.collection).fetch_dates(&target.dname, dates, *lshift, *rshift, &o)?;
                        csv_adapter::write_frame(out, &f)
                    }
                    Kind::Intraday => {
                        let f = self.intraday(&target.collection)?.fetch_dates(
                            &intraday_request(target),
                            dates,
                            *lshift,
                            *rshift,
                            &o,
                        )?;
                        csv_adapter::write_frame(out, &f)
                    }
                    Kind::Record => {
                        match self.record(&target.collection).fetch_dates(
                            &parse_list(&target.dname),
                            dates,
                            *lshift,
                            *rshift,
                            &o,
                        )? {
                            RecordDates::Panel(p) => csv_adapter::write_panel(out, &p),
                            RecordDates::Windows(ws) => csv_adapter::write_record_windows(out, &ws),
                        }
                    }
                }
            }
            Command::Intervals {
                collection,
                dname,
                date,
                slot,
                num,
                offset,
                overrides,
                ..
            } => {
                let f = self.intraday(collection)?.fetch_intervals(
                    dname,
                    date,
                    slot,
                    *num,
                    *offset,
                    &overrides.to_overrides(),
                )?;
                csv_adapter::write_frame(out, &f)
            }
            Command::Import { .. } => Err(FetchError::ConfigInvalid {
                section: "cli".into(),
                key: "import".into(),
                reason: "import needs a writable store".into(),
            }),
        }
    }
}
