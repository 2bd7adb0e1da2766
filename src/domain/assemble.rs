//! Multi-date result assembly.
//!
//! Per-date results are gathered in the caller's requested order and aligned
//! on the union of their inner axes. Gaps stay empty; nothing is interpolated.

use crate::domain::error::FetchError;
use crate::domain::table::{union_axis, Cell, Label, Panel, Series, Table};

/// One row per requested date, columns the union of the series indexes.
pub fn stack_series(parts: Vec<(Label, Series)>) -> Table {
    let indexes: Vec<&[String]> = parts.iter().map(|(_, s)| s.index.as_slice()).collect();
    let columns = union_axis(&indexes);
    let (index, rows): (Vec<Label>, Vec<Vec<Cell>>) = parts
        .into_iter()
        .map(|(label, s)| (label, s.reindex(&columns).values))
        .unzip();
    Table::new(index, columns, rows)
}

/// One item per requested date, major and minor axes the unions of the tables'.
pub fn stack_tables(parts: Vec<(Label, Table)>) -> Panel {
    Panel::from_tables(parts)
}

/// Run `fetch` for every planned item, dropping items that fail with a
/// skippable error. Any other error aborts the batch.
pub fn collect_skipping<P, T, F>(plans: &[P], mut fetch: F) -> Result<Vec<(Label, T)>, FetchError>
where
    P: Planned,
    F: FnMut(&P) -> Result<T, FetchError>,
{
    let mut out = Vec::with_capacity(plans.len());
    for plan in plans {
        match fetch(plan) {
            Ok(value) => out.push((plan.label().clone(), value)),
            Err(e) if e.is_skippable() => {
                tracing::warn!(requested = %plan.label(), error = %e, "skipping date");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

/// Anything keyed by a requested-date label.
pub trait Planned {
    fn label(&self) -> &Label;
}
