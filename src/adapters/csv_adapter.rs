//! CSV import into a document store and CSV export of fetched shapes.
//!
//! Series files are wide: `date[,time],sid,<dname>...`, one line per
//! `(date[, time], sid)`. They fold into one document per `(dname, date[, time])`.
//! Record files are `date,sid,<series>...` and map one line to one document.

use crate::domain::error::FetchError;
use crate::domain::table::{union_axis, Cell, Frame, Label, Panel, RecordFrame, Series, Table};
use crate::ports::store_port::{Document, DocumentWriter};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportLayout {
    Series,
    Records,
}

fn csv_error(e: csv::Error) -> FetchError {
    FetchError::Csv {
        reason: e.to_string(),
    }
}

fn parse_cell(raw: &str, line: usize, column: &str) -> Result<Option<f64>, FetchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: f64 = raw.parse().map_err(|e| FetchError::Csv {
        reason: format!("line {line}, column {column}: invalid value {raw:?}: {e}"),
    })?;
    // NaN and infinities are missing observations.
    Ok(value.is_finite().then_some(value))
}

type SeriesKey = (String, String, Option<String>);

/// Parse a wide series file into documents, skipping empty cells.
pub fn read_series<R: io::Read>(reader: R) -> Result<Vec<Document>, FetchError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().map_err(csv_error)?.clone();
    let has_time = headers.get(1) == Some("time");
    let sid_col = if has_time { 2 } else { 1 };
    if headers.get(0) != Some("date") || headers.get(sid_col) != Some("sid") {
        return Err(FetchError::Csv {
            reason: "series header must start with date[,time],sid".into(),
        });
    }
    let dnames: Vec<&str> = headers.iter().skip(sid_col + 1).collect();

    let mut grouped: BTreeMap<SeriesKey, BTreeMap<String, f64>> = BTreeMap::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_error)?;
        let line = i + 2;
        let date = record.get(0).unwrap_or_default().trim().to_string();
        let time = has_time.then(|| record.get(1).unwrap_or_default().trim().to_string());
        let sid = record.get(sid_col).unwrap_or_default().trim().to_string();
        if date.is_empty() || sid.is_empty() {
            return Err(FetchError::Csv {
                reason: format!("line {line}: missing date or sid"),
            });
        }
        for (j, dname) in dnames.iter().enumerate() {
            let raw = record.get(sid_col + 1 + j).unwrap_or_default();
            if let Some(value) = parse_cell(raw, line, dname)? {
                grouped
                    .entry((dname.to_string(), date.clone(), time.clone()))
                    .or_default()
                    .insert(sid.clone(), value);
            }
        }
    }

    Ok(grouped
        .into_iter()
        .map(|((dname, date, time), dvalue)| Document {
            dname: Some(dname),
            date,
            time,
            sid: None,
            dvalue,
        })
        .collect())
}

/// Parse a record file, one document per line.
pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<Document>, FetchError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().map_err(csv_error)?.clone();
    if headers.get(0) != Some("date") || headers.get(1) != Some("sid") {
        return Err(FetchError::Csv {
            reason: "record header must start with date,sid".into(),
        });
    }
    let fields: Vec<&str> = headers.iter().skip(2).collect();

    let mut docs = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(csv_error)?;
        let line = i + 2;
        let date = record.get(0).unwrap_or_default().trim();
        let sid = record.get(1).unwrap_or_default().trim();
        if date.is_empty() || sid.is_empty() {
            return Err(FetchError::Csv {
                reason: format!("line {line}: missing date or sid"),
            });
        }
        let mut values = Vec::new();
        for (j, field) in fields.iter().enumerate() {
            if let Some(v) = parse_cell(record.get(2 + j).unwrap_or_default(), line, field)? {
                values.push((*field, v));
            }
        }
        docs.push(Document::record(date, sid, values));
    }
    Ok(docs)
}

/// Load a CSV file into `collection`, returning the number of documents written.
pub fn import_file<P: AsRef<Path>>(
    store: &dyn DocumentWriter,
    collection: &str,
    path: P,
    layout: ImportLayout,
) -> Result<usize, FetchError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let docs = match layout {
        ImportLayout::Series => read_series(file)?,
        ImportLayout::Records => read_records(file)?,
    };
    let written = store.upsert_many(collection, docs)?;
    tracing::info!(collection, file = %path.display(), documents = written, "import complete");
    Ok(written)
}

fn format_cell(cell: Cell) -> String {
    cell.map(|v| v.to_string()).unwrap_or_default()
}

fn write_row<W: io::Write>(
    wtr: &mut csv::Writer<W>,
    keys: &[String],
    cells: &[Cell],
) -> Result<(), FetchError> {
    let row = keys
        .iter()
        .cloned()
        .chain(cells.iter().map(|c| format_cell(*c)));
    wtr.write_record(row).map_err(csv_error)
}

fn header(keys: &[&str], columns: &[String]) -> Vec<String> {
    keys.iter()
        .map(|k| k.to_string())
        .chain(columns.iter().cloned())
        .collect()
}

pub fn write_series<W: io::Write>(out: W, series: &Series) -> Result<(), FetchError> {
    let mut wtr = csv::Writer::from_writer(out);
    let name = series
        .name
        .as_ref()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "value".into());
    wtr.write_record(["sid", name.as_str()]).map_err(csv_error)?;
    for (sid, cell) in series.iter() {
        wtr.write_record([sid.to_string(), format_cell(cell)])
            .map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_table<W: io::Write>(out: W, table: &Table) -> Result<(), FetchError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(header(&["index"], &table.columns))
        .map_err(csv_error)?;
    for (label, row) in table.index.iter().zip(&table.rows) {
        write_row(&mut wtr, &[label.to_string()], row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Long form: one line per `(item, major)` pair.
pub fn write_panel<W: io::Write>(out: W, panel: &Panel) -> Result<(), FetchError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(header(&["item", "major"], &panel.minor))
        .map_err(csv_error)?;
    for (item, table) in panel.tables() {
        for (major, row) in table.index.iter().zip(&table.rows) {
            write_row(&mut wtr, &[item.to_string(), major.to_string()], row)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_records<W: io::Write>(out: W, frame: &RecordFrame) -> Result<(), FetchError> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(header(&["date", "sid"], &frame.columns))
        .map_err(csv_error)?;
    for ((date, sid), row) in frame.index.iter().zip(&frame.rows) {
        write_row(&mut wtr, &[date.to_string(), sid.clone()], row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Several record frames, keyed by requested date, over the union of their columns.
pub fn write_record_windows<W: io::Write>(
    out: W,
    windows: &[(Label, RecordFrame)],
) -> Result<(), FetchError> {
    let column_sets: Vec<&[String]> = windows.iter().map(|(_, f)| f.columns.as_slice()).collect();
    let columns = union_axis(&column_sets);
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(header(&["requested", "date", "sid"], &columns))
        .map_err(csv_error)?;
    for (requested, frame) in windows {
        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|c| frame.columns.iter().position(|x| x == c))
            .collect();
        for ((date, sid), row) in frame.index.iter().zip(&frame.rows) {
            let cells: Vec<Cell> = positions.iter().map(|p| p.and_then(|i| row[i])).collect();
            write_row(
                &mut wtr,
                &[requested.to_string(), date.to_string(), sid.clone()],
                &cells,
            )?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_frame<W: io::Write>(out: W, frame: &Frame) -> Result<(), FetchError> {
    match frame {
        Frame::Series(s) => write_series(out, s),
        Frame::Table(t) => write_table(out, t),
        Frame::Panel(p) => write_panel(out, p),
    }
}
