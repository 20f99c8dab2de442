//! chart-extract: reconstructs calibrated time series from SVG charts.
//!
//! A chart page is driven through a [`session::BrowserSession`]; the value
//! axis is calibrated from gridlines and tick labels, the data trace is read
//! from path geometry or hover tooltips, and the result is laid onto an
//! inferred calendar index.

pub mod api;
pub mod core;
pub mod error;
pub mod extensions;
pub mod session;
pub mod telemetry;

pub use api::{
    ExtractionOrchestrator, ExtractionOutcome, ExtractionResult, ExtractorConfig, PageRef,
    Strategy,
};
pub use error::{ErrorKind, ExtractError, ExtractResult};
