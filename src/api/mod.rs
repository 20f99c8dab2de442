//! Browser-facing extraction components and the orchestrator that runs them.
//!
//! Every component holds an `Rc` of the same [`ChartStateStore`], so an
//! interaction made through one is visible to all others.

mod axis_calibrator;
mod chart_state_store;
mod extractor_config;
mod orchestrator;
mod result;
mod series_reconciler;
mod time_index_builder;
mod tooltip_sampler;
mod trace_extractor;

pub use axis_calibrator::{AxisCalibrator, calibrate_snapshot};
pub use chart_state_store::{ChartSnapshot, ChartStateStore};
pub use extractor_config::{DomSelectors, ExtractorConfig, SamplerTuning, Timeouts};
pub use orchestrator::{
    ExtractionFailure, ExtractionOrchestrator, ExtractionOutcome, ExtractionStep, PageRef,
    PartialState,
};
pub use result::{
    EXTRACTION_RESULT_JSON_SCHEMA_V1, ExtractionResult, ExtractionResultJsonContractV1,
    ReconstructedSeries, SeriesComparison, SeriesPoint, Strategy, compare_series,
};
pub use series_reconciler::{Reconciliation, SeriesReconciler};
pub use time_index_builder::TimeIndexBuilder;
pub use tooltip_sampler::TooltipSampler;
pub use trace_extractor::{RawPixelSeries, TraceExtractor, extract_trace};
