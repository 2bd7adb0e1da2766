//! Domain error types.

/// Top-level error type for pitfetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid date expression {expr:?}: {reason}")]
    InvalidDate { expr: String, reason: String },

    #[error("out of range: {reason}")]
    OutOfRange { reason: String },

    #[error("store unreachable: {reason}")]
    Connectivity { reason: String },

    #[error("store query error: {reason}")]
    StoreQuery { reason: String },

    #[error("invalid calendar: {reason}")]
    InvalidCalendar { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("csv error: {reason}")]
    Csv { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub(crate) fn out_of_range(reason: impl Into<String>) -> Self {
        FetchError::OutOfRange {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_date(expr: &str, reason: impl Into<String>) -> Self {
        FetchError::InvalidDate {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors a batch operation may swallow per item.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            FetchError::OutOfRange { .. } | FetchError::InvalidDate { .. }
        )
    }
}

impl From<&FetchError> for std::process::ExitCode {
    fn from(err: &FetchError) -> Self {
        let code: u8 = match err {
            FetchError::Io(_) => 1,
            FetchError::ConfigParse { .. }
            | FetchError::ConfigMissing { .. }
            | FetchError::ConfigInvalid { .. } => 2,
            FetchError::Connectivity { .. } | FetchError::StoreQuery { .. } => 3,
            FetchError::InvalidDate { .. }
            | FetchError::OutOfRange { .. }
            | FetchError::InvalidCalendar { .. } => 4,
            FetchError::Csv { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
