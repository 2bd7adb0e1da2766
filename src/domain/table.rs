//! Labeled output shapes: series, table, three-axis block and long record frame.
//!
//! Cells are `Option<f64>`; `None` is an empty cell. Reindexing and
//! chronological conversion only touch axis labels and membership.

use crate::domain::dateutil::DATE_FORMAT;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

pub type Cell = Option<f64>;

const TIME_FORMATS: [&str; 4] = ["%H%M", "%H:%M", "%H%M%S", "%H:%M:%S"];

/// Row or item label: a raw string, or its chronological form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Label {
    /// Parse `YYYYMMDD` into a date and `YYYYMMDD HHMM` into a timestamp.
    /// Labels that do not parse are returned unchanged.
    pub fn to_chronological(&self) -> Label {
        let Label::Text(text) = self else {
            return self.clone();
        };
        match text.split_once(' ') {
            Some((date, time)) => parse_timestamp(date, time)
                .map(Label::Timestamp)
                .unwrap_or_else(|| self.clone()),
            None => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(Label::Date)
                .unwrap_or_else(|_| self.clone()),
        }
    }

    /// Join a date label and a slot label into one chronological label.
    pub fn join(date: &Label, slot: &str) -> Label {
        Label::Text(format!("{date} {slot}")).to_chronological()
    }
}

pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(time, fmt).ok())
        .map(|t| date.and_time(t))
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Text(s) => write!(f, "{s}"),
            Label::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Label::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::Text(s.to_string())
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Label::Text(s)
    }
}

/// Keep a shared axis as is; otherwise take the sorted union.
pub fn union_axis<T: Ord + Clone>(axes: &[&[T]]) -> Vec<T> {
    match axes.split_first() {
        None => Vec::new(),
        Some((first, rest)) if rest.iter().all(|a| a == first) => first.to_vec(),
        Some(_) => axes
            .iter()
            .flat_map(|a| a.iter().cloned())
            .collect::<BTreeSet<T>>()
            .into_iter()
            .collect(),
    }
}

/// A single labeled vector, e.g. one date's cross-section keyed by sid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    pub name: Option<Label>,
    pub index: Vec<String>,
    pub values: Vec<Cell>,
}

impl Series {
    pub fn new(name: Option<Label>, index: Vec<String>, values: Vec<Cell>) -> Self {
        debug_assert_eq!(index.len(), values.len());
        Self {
            name,
            index,
            values,
        }
    }

    /// A series of empty cells over `index`.
    pub fn empty(name: Option<Label>, index: Vec<String>) -> Self {
        let values = vec![None; index.len()];
        Self::new(name, index, values)
    }

    pub fn from_map(name: Option<Label>, map: &BTreeMap<String, f64>) -> Self {
        Self::new(
            name,
            map.keys().cloned().collect(),
            map.values().map(|v| Some(*v)).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn get(&self, key: &str) -> Cell {
        self.index
            .iter()
            .position(|k| k == key)
            .and_then(|i| self.values[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.iter().any(|k| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Cell)> {
        self.index
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Non-empty cell count.
    pub fn count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn reindex(&self, index: &[String]) -> Series {
        let lookup: HashMap<&str, Cell> = self.iter().collect();
        Series::new(
            self.name.clone(),
            index.to_vec(),
            index
                .iter()
                .map(|k| lookup.get(k.as_str()).copied().flatten())
                .collect(),
        )
    }
}

/// Two-axis table: rows keyed by [`Label`], columns by sid (or series name).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub index: Vec<Label>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(index: Vec<Label>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        debug_assert_eq!(index.len(), rows.len());
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self {
            index,
            columns,
            rows,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A table of empty cells over the given axes.
    pub fn blank(index: Vec<Label>, columns: Vec<String>) -> Self {
        let rows = vec![vec![None; columns.len()]; index.len()];
        Self::new(index, columns, rows)
    }

    /// One row per map, columns the sorted union of all keys.
    pub fn from_row_maps<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (Label, &'a BTreeMap<String, f64>)>,
    {
        let rows: Vec<(Label, &BTreeMap<String, f64>)> = rows.into_iter().collect();
        let columns: Vec<String> = rows
            .iter()
            .flat_map(|(_, m)| m.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let data: Vec<Vec<Cell>> = rows
            .iter()
            .map(|(_, m)| columns.iter().map(|c| m.get(c).copied()).collect::<Vec<Cell>>())
            .collect();
        Self::new(rows.into_iter().map(|(l, _)| l).collect(), columns, data)
    }

    pub fn nrows(&self) -> usize {
        self.index.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn row_position(&self, label: &Label) -> Option<usize> {
        self.index.iter().position(|l| l == label)
    }

    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, row: &Label, column: &str) -> Cell {
        let r = self.row_position(row)?;
        let c = self.column_position(column)?;
        self.rows[r][c]
    }

    /// Row `i` as a series named by its label.
    pub fn row(&self, i: usize) -> Option<Series> {
        let values = self.rows.get(i)?.clone();
        Some(Series::new(
            Some(self.index[i].clone()),
            self.columns.clone(),
            values,
        ))
    }

    pub fn column(&self, column: &str) -> Option<Vec<Cell>> {
        let c = self.column_position(column)?;
        Some(self.rows.iter().map(|r| r[c]).collect())
    }

    pub fn reindex_columns(&self, columns: &[String]) -> Table {
        let positions: Vec<Option<usize>> =
            columns.iter().map(|c| self.column_position(c)).collect();
        let rows: Vec<Vec<Cell>> = self
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|p| p.and_then(|i| row[i]))
                    .collect::<Vec<Cell>>()
            })
            .collect();
        Table::new(self.index.clone(), columns.to_vec(), rows)
    }

    pub fn reindex_rows(&self, index: &[Label]) -> Table {
        let rows: Vec<Vec<Cell>> = index
            .iter()
            .map(|l| match self.row_position(l) {
                Some(r) => self.rows[r].clone(),
                None => vec![None; self.columns.len()],
            })
            .collect();
        Table::new(index.to_vec(), self.columns.clone(), rows)
    }

    pub fn with_chronological_index(mut self) -> Table {
        self.index = self.index.iter().map(Label::to_chronological).collect();
        self
    }
}

/// Three-axis block: `items x major x minor`, stored as one table per item.
///
/// Every item table shares the same major index and minor columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Panel {
    pub items: Vec<Label>,
    pub major: Vec<Label>,
    pub minor: Vec<String>,
    tables: Vec<Table>,
}

impl Panel {
    /// Align tables onto the union of their axes, empty cells where absent.
    pub fn from_tables(parts: Vec<(Label, Table)>) -> Panel {
        let indexes: Vec<&[Label]> = parts.iter().map(|(_, t)| t.index.as_slice()).collect();
        let columns: Vec<&[String]> = parts.iter().map(|(_, t)| t.columns.as_slice()).collect();
        let major = union_axis(&indexes);
        let minor = union_axis(&columns);
        let (items, tables): (Vec<Label>, Vec<Table>) = parts
            .into_iter()
            .map(|(item, t)| (item, t.reindex_rows(&major).reindex_columns(&minor)))
            .unzip();
        Panel {
            items,
            major,
            minor,
            tables,
        }
    }

    pub fn blank(items: Vec<Label>, major: Vec<Label>, minor: Vec<String>) -> Panel {
        let tables = items
            .iter()
            .map(|_| Table::blank(major.clone(), minor.clone()))
            .collect();
        Panel {
            items,
            major,
            minor,
            tables,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.items.len(), self.major.len(), self.minor.len())
    }

    pub fn item(&self, item: &Label) -> Option<&Table> {
        self.items
            .iter()
            .position(|i| i == item)
            .map(|p| &self.tables[p])
    }

    pub fn tables(&self) -> impl Iterator<Item = (&Label, &Table)> {
        self.items.iter().zip(self.tables.iter())
    }

    pub fn get(&self, item: &Label, major: &Label, minor: &str) -> Cell {
        self.item(item)?.get(major, minor)
    }

    pub(crate) fn set(&mut self, item: usize, major: usize, minor: usize, value: Cell) {
        self.tables[item].rows[major][minor] = value;
    }

    /// Cross-section at one major label: rows are items, columns are minor.
    pub fn major_xs(&self, major: &Label) -> Option<Table> {
        let m = self.major.iter().position(|l| l == major)?;
        let rows: Vec<Vec<Cell>> = self.tables.iter().map(|t| t.rows[m].clone()).collect();
        Some(Table::new(self.items.clone(), self.minor.clone(), rows))
    }

    pub fn reindex_minor(&self, minor: &[String]) -> Panel {
        Panel {
            items: self.items.clone(),
            major: self.major.clone(),
            minor: minor.to_vec(),
            tables: self.tables.iter().map(|t| t.reindex_columns(minor)).collect(),
        }
    }

    pub fn with_chronological_major(mut self) -> Panel {
        self.major = self.major.iter().map(Label::to_chronological).collect();
        for t in &mut self.tables {
            t.index = self.major.clone();
        }
        self
    }

    pub fn with_chronological_items(mut self) -> Panel {
        self.items = self.items.iter().map(Label::to_chronological).collect();
        self
    }

    /// Flatten a slot-item, date-major block into one timestamp-indexed table.
    ///
    /// Rows run date by date, slot by slot; the row label is the date label
    /// and slot label joined and parsed as a timestamp.
    pub fn to_frame(&self) -> Table {
        let mut index = Vec::with_capacity(self.items.len() * self.major.len());
        let mut rows = Vec::with_capacity(index.capacity());
        for (m, date) in self.major.iter().enumerate() {
            for (item, table) in self.items.iter().zip(&self.tables) {
                index.push(Label::join(date, &item.to_string()));
                rows.push(table.rows[m].clone());
            }
        }
        Table::new(index, self.minor.clone(), rows)
    }
}

/// Any of the three output shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Series(Series),
    Table(Table),
    Panel(Panel),
}

impl Frame {
    pub fn ndim(&self) -> usize {
        match self {
            Frame::Series(_) => 1,
            Frame::Table(_) => 2,
            Frame::Panel(_) => 3,
        }
    }

    pub fn as_series(&self) -> Option<&Series> {
        match self {
            Frame::Series(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Frame::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_panel(&self) -> Option<&Panel> {
        match self {
            Frame::Panel(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            Frame::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_panel(self) -> Option<Panel> {
        match self {
            Frame::Panel(p) => Some(p),
            _ => None,
        }
    }
}

/// Long-format rows keyed by `(date, sid)`, one column per series name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordFrame {
    pub index: Vec<(Label, String)>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RecordFrame {
    pub fn new(index: Vec<(Label, String)>, columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        debug_assert_eq!(index.len(), rows.len());
        Self {
            index,
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Distinct dates in row order.
    pub fn dates(&self) -> Vec<Label> {
        let mut seen = BTreeSet::new();
        self.index
            .iter()
            .filter(|(d, _)| seen.insert(d.clone()))
            .map(|(d, _)| d.clone())
            .collect()
    }

    pub fn get(&self, date: &Label, sid: &str, column: &str) -> Cell {
        let c = self.columns.iter().position(|x| x == column)?;
        let r = self.index.iter().position(|(d, s)| d == date && s == sid)?;
        self.rows[r][c]
    }

    /// Rows of one date as a `sid x series` table.
    pub fn cross_section(&self, date: &Label) -> Table {
        let (index, rows): (Vec<Label>, Vec<Vec<Cell>>) = self
            .index
            .iter()
            .zip(&self.rows)
            .filter(|((d, _), _)| d == date)
            .map(|((_, sid), row)| (Label::Text(sid.clone()), row.clone()))
            .unzip();
        Table::new(index, self.columns.clone(), rows)
    }

    /// Force every date's sid set to exactly `sids`.
    pub fn reindex_sids(&self, sids: &[String]) -> RecordFrame {
        let mut index = Vec::new();
        let mut rows = Vec::new();
        for date in self.dates() {
            let section = self.cross_section(&date);
            for sid in sids {
                index.push((date.clone(), sid.clone()));
                rows.push(match section.row_position(&Label::Text(sid.clone())) {
                    Some(r) => section.rows[r].clone(),
                    None => vec![None; self.columns.len()],
                });
            }
        }
        RecordFrame::new(index, self.columns.clone(), rows)
    }

    pub fn with_chronological_dates(mut self) -> RecordFrame {
        for (date, _) in &mut self.index {
            *date = date.to_chronological();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sids(s: &[&str]) -> Vec<String> {
        s.iter().map(|x| x.to_string()).collect()
    }

    fn map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn label_chronological_parsing() {
        assert_eq!(
            Label::from("20140106").to_chronological(),
            Label::Date(NaiveDate::from_ymd_opt(2014, 1, 6).unwrap())
        );
        let ts = Label::from("20140106 0930").to_chronological();
        assert_eq!(
            ts,
            Label::Timestamp(
                NaiveDate::from_ymd_opt(2014, 1, 6)
                    .unwrap()
                    .and_hms_opt(9, 30, 0)
                    .unwrap()
            )
        );
        assert!(matches!(
            Label::from("20140106 09:30").to_chronological(),
            Label::Timestamp(_)
        ));
        assert_eq!(Label::from("close").to_chronological(), Label::from("close"));
    }

    #[test]
    fn label_date_display_round_trips() {
        let date = Label::from("20140106").to_chronological();
        assert_eq!(date.to_string(), "20140106");
        assert_eq!(Label::join(&date, "1000").to_string(), "2014-01-06 10:00:00");
    }

    #[test]
    fn union_axis_keeps_shared_order() {
        let a = sids(&["C", "A"]);
        let b = sids(&["C", "A"]);
        assert_eq!(union_axis(&[a.as_slice(), b.as_slice()]), sids(&["C", "A"]));
        let c = sids(&["B"]);
        assert_eq!(union_axis(&[a.as_slice(), c.as_slice()]), sids(&["A", "B", "C"]));
    }

    #[test]
    fn series_reindex_adds_empty_and_drops_extra() {
        let s = Series::from_map(None, &map(&[("A", 1.0), ("C", 3.0), ("Z", 9.0)]));
        let r = s.reindex(&sids(&["A", "B", "C"]));
        assert_eq!(r.index, sids(&["A", "B", "C"]));
        assert_eq!(r.values, vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(r.reindex(&sids(&["A", "B", "C"])), r);
    }

    #[test]
    fn table_from_row_maps_unions_columns() {
        let m1 = map(&[("A", 1.0)]);
        let m2 = map(&[("B", 2.0)]);
        let t = Table::from_row_maps(vec![(Label::from("d1"), &m1), (Label::from("d2"), &m2)]);
        assert_eq!(t.columns, sids(&["A", "B"]));
        assert_eq!(t.get(&Label::from("d1"), "B"), None);
        assert_eq!(t.get(&Label::from("d2"), "B"), Some(2.0));
    }

    #[test]
    fn table_reindex_columns_is_idempotent() {
        let m = map(&[("A", 1.0), ("C", 3.0)]);
        let t = Table::from_row_maps(vec![(Label::from("d1"), &m)]);
        let universe = sids(&["A", "B", "C"]);
        let once = t.reindex_columns(&universe);
        assert_eq!(once.columns, universe);
        assert_eq!(once.rows[0], vec![Some(1.0), None, Some(3.0)]);
        assert_eq!(once.reindex_columns(&universe), once);
    }

    #[test]
    fn panel_aligns_on_union_of_inner_axes() {
        let t1 = Table::new(
            vec![Label::from("x"), Label::from("y")],
            sids(&["A"]),
            vec![vec![Some(1.0)], vec![Some(2.0)]],
        );
        let t2 = Table::new(
            vec![Label::from("y"), Label::from("z")],
            sids(&["A"]),
            vec![vec![Some(3.0)], vec![Some(4.0)]],
        );
        let p = Panel::from_tables(vec![(Label::from("d1"), t1), (Label::from("d2"), t2)]);
        assert_eq!(p.shape(), (2, 3, 1));
        assert_eq!(p.get(&Label::from("d1"), &Label::from("z"), "A"), None);
        assert_eq!(p.get(&Label::from("d2"), &Label::from("x"), "A"), None);
        assert_eq!(p.get(&Label::from("d2"), &Label::from("y"), "A"), Some(3.0));
    }

    #[test]
    fn panel_major_xs_rows_are_items() {
        let t1 = Table::new(vec![Label::from("d1")], sids(&["A"]), vec![vec![Some(1.0)]]);
        let t2 = Table::new(vec![Label::from("d1")], sids(&["A"]), vec![vec![Some(2.0)]]);
        let p = Panel::from_tables(vec![(Label::from("0930"), t1), (Label::from("1000"), t2)]);
        let xs = p.major_xs(&Label::from("d1")).unwrap();
        assert_eq!(xs.index, vec![Label::from("0930"), Label::from("1000")]);
        assert_eq!(xs.column("A").unwrap(), vec![Some(1.0), Some(2.0)]);
    }

    #[test]
    fn panel_to_frame_orders_date_then_slot() {
        let t1 = Table::new(
            vec![Label::from("20140102"), Label::from("20140103")],
            sids(&["A"]),
            vec![vec![Some(1.0)], vec![Some(3.0)]],
        );
        let t2 = Table::new(
            vec![Label::from("20140102"), Label::from("20140103")],
            sids(&["A"]),
            vec![vec![Some(2.0)], vec![Some(4.0)]],
        );
        let p = Panel::from_tables(vec![(Label::from("0930"), t1), (Label::from("1000"), t2)]);
        let frame = p.to_frame();
        let labels: Vec<String> = frame.index.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            labels,
            vec![
                "2014-01-02 09:30:00",
                "2014-01-02 10:00:00",
                "2014-01-03 09:30:00",
                "2014-01-03 10:00:00"
            ]
        );
        assert_eq!(frame.column("A").unwrap(), vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn record_frame_reindex_and_cross_section() {
        let frame = RecordFrame::new(
            vec![
                (Label::from("d1"), "A".to_string()),
                (Label::from("d1"), "Z".to_string()),
            ],
            sids(&["close"]),
            vec![vec![Some(1.0)], vec![Some(9.0)]],
        );
        let r = frame.reindex_sids(&sids(&["A", "B"]));
        assert_eq!(r.len(), 2);
        assert_eq!(r.get(&Label::from("d1"), "A", "close"), Some(1.0));
        assert_eq!(r.get(&Label::from("d1"), "B", "close"), None);
        let xs = r.cross_section(&Label::from("d1"));
        assert_eq!(xs.index, vec![Label::from("A"), Label::from("B")]);
    }
}
