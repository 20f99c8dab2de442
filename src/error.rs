use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ExtractResult<T> = Result<T, ExtractError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// Element not yet present/clickable after the bounded wait.
    #[error("ui element `{selector}` not ready after {attempts} attempt(s)")]
    TransientUi { selector: String, attempts: u32 },

    #[error("ambiguous dom: selector `{selector}` matched {count} nodes")]
    AmbiguousDom { selector: String, count: usize },

    #[error("axis calibration insufficient: {0}")]
    CalibrationInsufficient(String),

    #[error("frequency indeterminate: {0}")]
    FrequencyIndeterminate(String),

    #[error("browser session lost: {0}")]
    SessionLost(String),

    #[error("element not found: `{selector}`")]
    ElementMissing { selector: String },

    #[error("tooltip empty at pointer ({x}, {y})")]
    TooltipEmpty { x: f64, y: f64 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("stale snapshot: {0}")]
    StaleSnapshot(String),

    #[error("incomplete coverage: {0}")]
    IncompleteCoverage(String),
}

/// Serializable error category carried by failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    TransientUi,
    AmbiguousDom,
    CalibrationInsufficient,
    FrequencyIndeterminate,
    SessionLost,
    ElementMissing,
    TooltipEmpty,
    Parse,
    InvalidData,
    Unsupported,
    StaleSnapshot,
    IncompleteCoverage,
}

impl ExtractError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransientUi { .. } => ErrorKind::TransientUi,
            Self::AmbiguousDom { .. } => ErrorKind::AmbiguousDom,
            Self::CalibrationInsufficient(_) => ErrorKind::CalibrationInsufficient,
            Self::FrequencyIndeterminate(_) => ErrorKind::FrequencyIndeterminate,
            Self::SessionLost(_) => ErrorKind::SessionLost,
            Self::ElementMissing { .. } => ErrorKind::ElementMissing,
            Self::TooltipEmpty { .. } => ErrorKind::TooltipEmpty,
            Self::Parse(_) => ErrorKind::Parse,
            Self::InvalidData(_) => ErrorKind::InvalidData,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::StaleSnapshot(_) => ErrorKind::StaleSnapshot,
            Self::IncompleteCoverage(_) => ErrorKind::IncompleteCoverage,
        }
    }

    /// Errors the bounded-retry combinator may retry.
    ///
    /// A missing element is transient while the page is still settling; an
    /// ambiguous or lost session never is.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientUi { .. } | Self::ElementMissing { .. } | Self::TooltipEmpty { .. }
        )
    }

    /// Fatal for the whole session, not just the current attempt.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::SessionLost(_))
    }
}
