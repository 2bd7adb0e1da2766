//! Intraday clock and the `(trading day, slot)` coordinate stepper.

use crate::domain::calendar::{Direction, TradingCalendar};
use crate::domain::error::FetchError;

/// Ordered intraday slot labels, e.g. `0930, 1000, ..., 1500`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntradayClock {
    slots: Vec<String>,
}

/// A two-digit mixed-radix position: `day` indexes the calendar, `slot` the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotPosition {
    pub day: usize,
    pub slot: usize,
}

impl SlotPosition {
    /// Step `offset` slots, carrying into neighbouring days.
    ///
    /// Returns `None` when the result leaves `[0, days) x [0, slots_per_day)`.
    pub fn step(self, offset: i64, days: usize, slots_per_day: usize) -> Option<SlotPosition> {
        if slots_per_day == 0 || self.slot >= slots_per_day {
            return None;
        }
        let radix = slots_per_day as i64;
        let linear = self.day as i64 * radix + self.slot as i64 + offset;
        if linear < 0 || linear >= days as i64 * radix {
            return None;
        }
        Some(SlotPosition {
            day: (linear / radix) as usize,
            slot: (linear % radix) as usize,
        })
    }
}

impl IntradayClock {
    pub fn new(slots: Vec<String>) -> Result<Self, FetchError> {
        if slots.is_empty() {
            return Err(FetchError::InvalidCalendar {
                reason: "intraday clock has no slots".into(),
            });
        }
        if let Some(pair) = slots.windows(2).find(|w| w[0] >= w[1]) {
            return Err(FetchError::InvalidCalendar {
                reason: format!("slot {} is not strictly after {}", pair[1], pair[0]),
            });
        }
        Ok(Self { slots })
    }

    /// Parse a comma separated slot list.
    pub fn parse(input: &str) -> Result<Self, FetchError> {
        Self::new(
            input
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn index_of(&self, slot: &str) -> Option<usize> {
        self.slots.iter().position(|s| s == slot)
    }

    /// `count` consecutive coordinates, ascending, ending `offset` slots from `(date, slot)`.
    ///
    /// Positive `offset` moves forward in time. Non-trading days never appear
    /// because days are stepped by calendar position.
    pub fn coordinates(
        &self,
        calendar: &TradingCalendar,
        date: &str,
        slot: &str,
        count: usize,
        offset: i64,
    ) -> Result<Vec<(String, String)>, FetchError> {
        let (day, _) = calendar.resolve(date, Direction::Backward)?;
        let slot_index = self
            .index_of(slot)
            .ok_or_else(|| FetchError::out_of_range(format!("unknown intraday slot {slot}")))?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let days = calendar.len();
        let per_day = self.slots.len();
        let origin = SlotPosition {
            day,
            slot: slot_index,
        };
        let last = origin.step(offset, days, per_day).ok_or_else(|| {
            FetchError::out_of_range(format!(
                "stepping {offset} slots from {date} {slot} leaves the calendar"
            ))
        })?;
        let first = last
            .step(-(count as i64 - 1), days, per_day)
            .ok_or_else(|| {
                FetchError::out_of_range(format!(
                    "{count} slots ending {offset} slots from {date} {slot} start before the calendar"
                ))
            })?;

        let mut coords = Vec::with_capacity(count);
        let mut cursor = first;
        loop {
            coords.push((
                calendar.as_slice()[cursor.day].clone(),
                self.slots[cursor.slot].clone(),
            ));
            if cursor == last {
                break;
            }
            match cursor.step(1, days, per_day) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        Ok(coords)
    }
}
