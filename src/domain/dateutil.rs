//! Calendar arithmetic: fuzzy date completion and window cutting.
//!
//! Every window returned here is a borrowed, contiguous run of the calendar's
//! own labels, so a window can never straddle a non-trading day.

use crate::domain::calendar::{Direction, TradingCalendar};
use crate::domain::error::FetchError;
use chrono::{Datelike, NaiveDate};

pub const DATE_FORMAT: &str = "%Y%m%d";

/// Complete a date expression to an exact `YYYYMMDD` label.
///
/// `YYYY` and `YYYYMM` complete to the first (`Backward`) or last (`Forward`)
/// day of the period. Dashes and slashes are stripped. With `validate` set the
/// expression must name a real year, month or day; without it the completion
/// is best effort and the input is passed through when it cannot be read.
pub fn normalize(expr: &str, direction: Direction, validate: bool) -> Result<String, FetchError> {
    let compact: String = expr
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '/'))
        .collect();

    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit()) {
        if validate {
            return Err(FetchError::invalid_date(expr, "expected digits"));
        }
        return Ok(compact);
    }

    match compact.len() {
        4 => Ok(match direction {
            Direction::Backward => format!("{compact}0101"),
            Direction::Forward => format!("{compact}1231"),
        }),
        6 => {
            let year: i32 = compact[..4].parse().unwrap_or_default();
            let month: u32 = compact[4..].parse().unwrap_or_default();
            let first = NaiveDate::from_ymd_opt(year, month, 1);
            match (first, direction) {
                (Some(_), Direction::Backward) => Ok(format!("{compact}01")),
                (Some(first), Direction::Forward) => {
                    let last = last_day_of_month(first);
                    Ok(last.format(DATE_FORMAT).to_string())
                }
                (None, _) if validate => {
                    Err(FetchError::invalid_date(expr, format!("no such month {month}")))
                }
                (None, Direction::Backward) => Ok(format!("{compact}01")),
                (None, Direction::Forward) => Ok(format!("{compact}31")),
            }
        }
        8 => {
            if validate && NaiveDate::parse_from_str(&compact, DATE_FORMAT).is_err() {
                return Err(FetchError::invalid_date(expr, "no such calendar day"));
            }
            Ok(compact)
        }
        n if validate => Err(FetchError::invalid_date(
            expr,
            format!("expected 4, 6 or 8 digits, got {n}"),
        )),
        _ => Ok(compact),
    }
}

fn last_day_of_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

pub fn to_datestr(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Closed window `[start, end]` with the left edge shifted by `backdays`.
///
/// `start` resolves backward and `end` forward. Positive `backdays` extends the
/// window earlier, negative trims it. Bounds never raise here: a left edge
/// before the calendar clamps to position 0 and an `end` past the calendar
/// clamps to the last day. An inverted window is empty.
pub fn cut_window<'a>(
    calendar: &'a TradingCalendar,
    start: &str,
    end: Option<&str>,
    backdays: i64,
) -> &'a [String] {
    let si = calendar
        .resolve(start, Direction::Backward)
        .map(|(i, _)| i)
        .unwrap_or(0) as i64;
    let ei = match end {
        Some(end) => calendar
            .resolve(end, Direction::Forward)
            .map(|(i, _)| i)
            .unwrap_or(calendar.len() - 1),
        None => calendar.len() - 1,
    };
    let left = (si - backdays).max(0) as usize;
    calendar.slice(left..=ei)
}

/// The `backdays` trading days ending `delay` days before `date`.
///
/// With `delay >= 1` the window never contains `date` itself. Returns an empty
/// window when the history does not fit inside the calendar.
pub fn history_window<'a>(
    calendar: &'a TradingCalendar,
    date: &str,
    backdays: usize,
    delay: i64,
) -> Result<&'a [String], FetchError> {
    let (di, _) = calendar.resolve(date, Direction::Backward)?;
    let end = di as i64 - delay;
    let start = end - backdays as i64 + 1;
    if backdays == 0 || start < 0 || end >= calendar.len() as i64 {
        return Ok(&[]);
    }
    Ok(calendar.slice(start as usize..=end as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// d0..d9 as 20140101..20140110 with no gaps.
    fn ten_days() -> TradingCalendar {
        TradingCalendar::new((1..=10).map(|d| format!("201401{d:02}")).collect()).unwrap()
    }

    fn gapped() -> TradingCalendar {
        TradingCalendar::new(
            ["20140102", "20140103", "20140106", "20140107", "20140108"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn normalize_completes_partial_expressions() {
        assert_eq!(normalize("2014", Direction::Backward, true).unwrap(), "20140101");
        assert_eq!(normalize("2014", Direction::Forward, true).unwrap(), "20141231");
        assert_eq!(normalize("201402", Direction::Backward, true).unwrap(), "20140201");
        assert_eq!(normalize("201402", Direction::Forward, true).unwrap(), "20140228");
        assert_eq!(normalize("201212", Direction::Forward, true).unwrap(), "20121231");
        assert_eq!(normalize("2014-01-06", Direction::Backward, true).unwrap(), "20140106");
    }

    #[test]
    fn normalize_validation_rejects_malformed() {
        assert!(matches!(
            normalize("201413", Direction::Backward, true),
            Err(FetchError::InvalidDate { .. })
        ));
        assert!(normalize("20140230", Direction::Backward, true).is_err());
        assert!(normalize("2014010", Direction::Backward, true).is_err());
        assert!(normalize("yesterday", Direction::Backward, true).is_err());
    }

    #[test]
    fn normalize_best_effort_without_validation() {
        assert_eq!(normalize("201413", Direction::Forward, false).unwrap(), "20141331");
        assert_eq!(normalize("20140230", Direction::Backward, false).unwrap(), "20140230");
        assert_eq!(normalize("2014010", Direction::Backward, false).unwrap(), "2014010");
    }

    #[test]
    fn cut_window_inner_and_shifted() {
        let cal = ten_days();
        assert_eq!(
            cut_window(&cal, "20140103", Some("20140105"), 0),
            &["20140103", "20140104", "20140105"]
        );
        assert_eq!(
            cut_window(&cal, "20140103", Some("20140105"), 2),
            &["20140101", "20140102", "20140103", "20140104", "20140105"]
        );
        assert_eq!(
            cut_window(&cal, "20140103", Some("20140105"), -1),
            &["20140104", "20140105"]
        );
    }

    #[test]
    fn cut_window_open_end_runs_to_last_day() {
        let cal = ten_days();
        let window = cut_window(&cal, "20140108", None, 0);
        assert_eq!(window, &["20140108", "20140109", "20140110"]);
    }

    #[test]
    fn cut_window_clamps_left_edge() {
        let cal = ten_days();
        let window = cut_window(&cal, "20140102", Some("20140103"), 5);
        assert_eq!(window, &["20140101", "20140102", "20140103"]);
        let before = cut_window(&cal, "20131201", Some("20140102"), 0);
        assert_eq!(before, &["20140101", "20140102"]);
    }

    #[test]
    fn cut_window_resolves_gaps_outward() {
        let cal = gapped();
        // Saturday start resolves back to Friday, Sunday end forward to Monday.
        assert_eq!(
            cut_window(&cal, "20140104", Some("20140105"), 0),
            &["20140103", "20140106"]
        );
    }

    #[test]
    fn cut_window_inverted_is_empty() {
        let cal = ten_days();
        assert!(cut_window(&cal, "20140108", Some("20140103"), 0).is_empty());
    }

    #[test]
    fn history_window_excludes_base_day_with_delay() {
        let cal = ten_days();
        let window = history_window(&cal, "20140106", 3, 1).unwrap();
        assert_eq!(window, &["20140103", "20140104", "20140105"]);
    }

    #[test]
    fn history_window_zero_delay_ends_on_date() {
        let cal = ten_days();
        let window = history_window(&cal, "20140106", 2, 0).unwrap();
        assert_eq!(window, &["20140105", "20140106"]);
    }

    #[test]
    fn history_window_short_history_is_empty() {
        let cal = ten_days();
        assert!(history_window(&cal, "20140102", 3, 1).unwrap().is_empty());
        assert!(history_window(&cal, "20140110", 1, -1).unwrap().is_empty());
    }

    #[test]
    fn history_window_before_calendar_is_out_of_range() {
        let cal = ten_days();
        assert!(matches!(
            history_window(&cal, "20131231", 1, 0),
            Err(FetchError::OutOfRange { .. })
        ));
    }

    #[test]
    fn to_datestr_formats_compactly() {
        assert_eq!(
            to_datestr(NaiveDate::from_ymd_opt(2014, 3, 7).unwrap()),
            "20140307"
        );
    }
}
