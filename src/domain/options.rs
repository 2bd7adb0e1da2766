//! Fetch options: construction-time defaults merged with per-call overrides.

use crate::domain::error::FetchError;
use crate::ports::config_port::ConfigPort;

/// Defaults a fetcher is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Convert date labels to chronological labels.
    pub datetime_index: bool,
    /// Force the sid axis to the canonical universe.
    pub reindex: bool,
    /// Reject malformed date expressions at entry points.
    pub date_check: bool,
    /// Trading days between a base date and the last knowable day.
    pub delay: i64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            datetime_index: false,
            reindex: false,
            date_check: false,
            delay: 1,
        }
    }
}

impl FetchOptions {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FetchError> {
        let defaults = Self::default();
        let delay = config.get_int("fetch", "delay", defaults.delay);
        if delay < 0 {
            return Err(FetchError::ConfigInvalid {
                section: "fetch".into(),
                key: "delay".into(),
                reason: "delay must be non-negative".into(),
            });
        }
        Ok(Self {
            datetime_index: config.get_bool("fetch", "datetime_index", defaults.datetime_index),
            reindex: config.get_bool("fetch", "reindex", defaults.reindex),
            date_check: config.get_bool("fetch", "date_check", defaults.date_check),
            delay,
        })
    }

    pub fn merge(&self, overrides: &OptionOverrides) -> FetchOptions {
        FetchOptions {
            datetime_index: overrides.datetime_index.unwrap_or(self.datetime_index),
            reindex: overrides.reindex.unwrap_or(self.reindex),
            date_check: overrides.date_check.unwrap_or(self.date_check),
            delay: overrides.delay.unwrap_or(self.delay),
        }
    }
}

/// Per-call overrides; `None` keeps the fetcher's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    pub datetime_index: Option<bool>,
    pub reindex: Option<bool>,
    pub date_check: Option<bool>,
    pub delay: Option<i64>,
}

impl OptionOverrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn datetime_index(mut self, value: bool) -> Self {
        self.datetime_index = Some(value);
        self
    }

    pub fn reindex(mut self, value: bool) -> Self {
        self.reindex = Some(value);
        self
    }

    pub fn date_check(mut self, value: bool) -> Self {
        self.date_check = Some(value);
        self
    }

    pub fn delay(mut self, value: i64) -> Self {
        self.delay = Some(value);
        self
    }
}
