use std::fmt;
use std::rc::Rc;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::axis_calibration::AxisCalibration;
use crate::core::chart_type::ChartType;
use crate::core::frequency::Frequency;
use crate::core::time_index::{TimeIndex, period_label, step_period};
use crate::core::types::{DateRange, EndpointPair, TooltipSample};
use crate::error::{ErrorKind, ExtractError, ExtractResult};
use crate::session::BrowserSession;

use super::{
    AxisCalibrator, ChartStateStore, ExtractionResult, ReconstructedSeries, SeriesReconciler,
    Strategy, TimeIndexBuilder, TooltipSampler, TraceExtractor,
};

/// Chart page to extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageRef {
    /// Absolute page URL.
    Url(String),
    /// `country/indicator` path resolved against the configured base URL.
    Id(String),
}

impl PageRef {
    #[must_use]
    pub fn resolve(&self, base_url: &str) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Id(id) => format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                id.trim_matches('/')
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractionStep {
    LoadPage,
    SetDateSpan,
    ForceChartType,
    SampleEndpoints,
    SampleRecent,
    BuildIndex,
    CalibrateAxis,
    ExtractTrace,
    Reconcile,
    ScanTooltips,
    AssembleWindows,
}

impl fmt::Display for ExtractionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a strategy had produced before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartialState {
    pub completed: Vec<ExtractionStep>,
    pub endpoints: Option<EndpointPair>,
    pub index: Option<TimeIndex>,
    pub calibration: Option<AxisCalibration>,
    pub trace_points: Option<usize>,
    pub samples_collected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionFailure {
    pub strategy: Strategy,
    pub step: ExtractionStep,
    pub kind: ErrorKind,
    pub message: String,
    pub partial: PartialState,
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} strategy failed at {}: {}",
            self.strategy, self.step, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Success(ExtractionResult),
    Failure(ExtractionFailure),
}

impl ExtractionOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn result(&self) -> Option<&ExtractionResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

struct StepError {
    step: ExtractionStep,
    error: ExtractError,
}

/// Step bookkeeping for one strategy run.
struct Run {
    strategy: Strategy,
    partial: PartialState,
    metadata: IndexMap<String, String>,
}

impl Run {
    fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            partial: PartialState::default(),
            metadata: IndexMap::new(),
        }
    }

    fn step<T>(
        &mut self,
        step: ExtractionStep,
        f: impl FnOnce() -> ExtractResult<T>,
    ) -> Result<T, StepError> {
        debug!(strategy = %self.strategy, %step, "extraction step started");
        match f() {
            Ok(value) => {
                self.partial.completed.push(step);
                Ok(value)
            }
            Err(error) => {
                warn!(strategy = %self.strategy, %step, error = %error, "extraction step failed");
                Err(StepError { step, error })
            }
        }
    }

    fn note(&mut self, key: &str, value: impl ToString) {
        self.metadata.insert(key.to_owned(), value.to_string());
    }

    fn fail(self, err: StepError) -> ExtractionOutcome {
        ExtractionOutcome::Failure(ExtractionFailure {
            strategy: self.strategy,
            step: err.step,
            kind: err.error.kind(),
            message: err.error.to_string(),
            partial: self.partial,
        })
    }
}

fn title_case(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `(country, indicator)` slugs from a `scheme://host/country/indicator`
/// URL.
fn url_slugs(url: &str) -> (Option<String>, Option<String>) {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let mut segments = path.split('/').skip(1).filter(|segment| !segment.is_empty());
    let country = segments.next().map(str::to_owned);
    let indicator = segments.next().map(str::to_owned);
    (country, indicator)
}

/// Runs one extraction strategy end to end against a shared store.
///
/// Each step either completes or stops the strategy with a failure that
/// carries everything produced so far. Strategies never fall back onto
/// each other.
pub struct ExtractionOrchestrator<S: BrowserSession> {
    store: Rc<ChartStateStore<S>>,
    calibrator: AxisCalibrator<S>,
    tracer: TraceExtractor<S>,
    sampler: TooltipSampler<S>,
    index_builder: TimeIndexBuilder,
    reconciler: SeriesReconciler,
}

impl<S: BrowserSession> ExtractionOrchestrator<S> {
    #[must_use]
    pub fn new(store: Rc<ChartStateStore<S>>) -> Self {
        Self {
            calibrator: AxisCalibrator::new(Rc::clone(&store)),
            tracer: TraceExtractor::new(Rc::clone(&store)),
            sampler: TooltipSampler::new(Rc::clone(&store)),
            index_builder: TimeIndexBuilder::new(),
            reconciler: SeriesReconciler::new()
                .with_max_filled_fraction(store.config().max_filled_fraction),
            store,
        }
    }

    #[must_use]
    pub fn with_index_builder(mut self, index_builder: TimeIndexBuilder) -> Self {
        self.index_builder = index_builder;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Rc<ChartStateStore<S>> {
        &self.store
    }

    pub fn extract(
        &self,
        page: &PageRef,
        strategy: Strategy,
        range: Option<DateRange>,
    ) -> ExtractionOutcome {
        let url = page.resolve(&self.store.config().base_url);
        info!(url = url.as_str(), %strategy, ?range, "extraction started");

        let mut run = Run::new(strategy);
        run.note("url", &url);
        if let PageRef::Id(id) = page {
            run.note("id", id);
        }
        let (country, indicator) = url_slugs(&url);
        if let Some(indicator) = indicator {
            run.note("name", title_case(&indicator));
        }
        if let Some(country) = country {
            run.note("country", title_case(&country));
        }
        run.note("strategy", strategy);

        let outcome = match strategy {
            Strategy::TraceGeometry => self.trace_geometry(&mut run, &url, range),
            Strategy::TooltipSampling => self.tooltip_sampling(&mut run, &url, range),
            Strategy::Mixed => self.mixed(&mut run, &url, range),
        };
        match outcome {
            Ok(series) => {
                describe_series(&mut run, &series);
                info!(
                    %strategy,
                    points = series.len(),
                    frequency = %series.frequency(),
                    "extraction finished"
                );
                ExtractionOutcome::Success(ExtractionResult {
                    strategy,
                    series,
                    metadata: run.metadata,
                })
            }
            Err(err) => run.fail(err),
        }
    }

    fn prepare(
        &self,
        run: &mut Run,
        url: &str,
        range: Option<DateRange>,
    ) -> Result<(), StepError> {
        run.step(ExtractionStep::LoadPage, || self.store.load_page(url))?;
        if let Some(title) = self.store.snapshot().and_then(|snapshot| snapshot.title()) {
            run.note("title", title);
        }
        run.step(ExtractionStep::SetDateSpan, || match range {
            Some(range) => self.store.set_custom_date_range(range),
            None => self.store.select_widest_date_span(),
        })?;
        run.step(ExtractionStep::ForceChartType, || {
            self.store.force_chart_type(ChartType::Line)
        })?;
        Ok(())
    }

    fn endpoints(&self, run: &mut Run) -> Result<EndpointPair, StepError> {
        let endpoints = run.step(ExtractionStep::SampleEndpoints, || {
            self.sampler.first_last_dates()
        })?;
        if let Some(unit) = &endpoints.unit {
            run.note("unit", unit);
        }
        run.partial.endpoints = Some(endpoints.clone());
        Ok(endpoints)
    }

    fn recent(&self, run: &mut Run) -> Result<Vec<TooltipSample>, StepError> {
        let count = self.store.config().sampler.recent_points;
        let recent = run.step(ExtractionStep::SampleRecent, || {
            self.sampler.sample_recent_points(count)
        })?;
        run.partial.samples_collected += recent.len();
        Ok(recent)
    }

    fn note_index(run: &mut Run, index: &TimeIndex) {
        run.note("frequency", index.frequency().code());
        run.note("frequency_degraded", index.is_degraded());
        run.partial.index = Some(index.clone());
    }

    fn trace_geometry(
        &self,
        run: &mut Run,
        url: &str,
        range: Option<DateRange>,
    ) -> Result<ReconstructedSeries, StepError> {
        self.prepare(run, url, range)?;
        let endpoints = self.endpoints(run)?;
        let recent = self.recent(run)?;

        let trace_type = self.store.config().trace_chart_type;
        run.step(ExtractionStep::ForceChartType, || {
            self.store.force_chart_type(trace_type)
        })?;
        let calibration = run.step(ExtractionStep::CalibrateAxis, || {
            self.calibrator.calibrate_value_axis()
        })?;
        run.partial.calibration = Some(calibration.clone());
        let trace = run.step(ExtractionStep::ExtractTrace, || {
            self.tracer.extract_pixel_trace(trace_type)
        })?;
        run.partial.trace_points = Some(trace.len());
        if let Ok((min, max)) = self.calibrator.data_range(&trace, &calibration) {
            debug!(min, max, "trace data range estimated");
        }

        let index = run.step(ExtractionStep::BuildIndex, || {
            self.index_builder.build_index(
                endpoints.start.date,
                endpoints.end.date,
                &recent,
                Some(trace.len()),
            )
        })?;
        Self::note_index(run, &index);

        let reconciliation = run.step(ExtractionStep::Reconcile, || {
            self.reconciler
                .reconcile(&trace, &calibration, &index, &endpoints)
        })?;
        run.note("scale_source", format!("{:?}", reconciliation.plan.source));
        run.note("zero_crossing", reconciliation.plan.zero_crossing);
        run.note("filled_points", reconciliation.filled_points);
        Ok(reconciliation.series)
    }

    fn tooltip_sampling(
        &self,
        run: &mut Run,
        url: &str,
        range: Option<DateRange>,
    ) -> Result<ReconstructedSeries, StepError> {
        self.prepare(run, url, range)?;
        let endpoints = self.endpoints(run)?;
        let mut samples = run.step(ExtractionStep::ScanTooltips, || {
            self.sampler.scan_all_points()
        })?;
        run.partial.samples_collected += samples.len();
        samples.insert(0, endpoints.start);
        samples.push(endpoints.end);

        let (series, index) = run.step(ExtractionStep::BuildIndex, || {
            let (frequency, degraded) = self.index_builder.infer(&samples);
            let series = ReconstructedSeries::from_samples(&samples, frequency)?;
            let index = TimeIndex::from_observed(series.dates(), frequency)?.degraded(degraded);
            Ok((series, index))
        })?;
        Self::note_index(run, &index);
        Ok(series)
    }

    fn mixed(
        &self,
        run: &mut Run,
        url: &str,
        range: Option<DateRange>,
    ) -> Result<ReconstructedSeries, StepError> {
        self.prepare(run, url, range)?;
        let endpoints = self.endpoints(run)?;
        let recent = self.recent(run)?;
        let index = run.step(ExtractionStep::BuildIndex, || {
            self.index_builder
                .build_index(endpoints.start.date, endpoints.end.date, &recent, None)
        })?;
        Self::note_index(run, &index);

        let mut scanned = 0;
        let assembled = run.step(ExtractionStep::AssembleWindows, || {
            self.assemble_windows(&index, &mut scanned)
        });
        run.partial.samples_collected += scanned;
        let (series, filled_points) = assembled?;
        run.note("filled_points", filled_points);
        Ok(series)
    }

    /// Scans the index in bounded date ranges and lays the tooltip values
    /// onto it.
    fn assemble_windows(
        &self,
        index: &TimeIndex,
        samples_collected: &mut usize,
    ) -> ExtractResult<(ReconstructedSeries, usize)> {
        let frequency = index.frequency();
        let window = self.store.config().mixed_window_points.max(2);
        let mut slots: Vec<Option<f64>> = vec![None; index.len()];

        for chunk in index.dates().chunks(window) {
            let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else {
                continue;
            };
            let window_end = window_end(frequency, *last);
            self.store
                .set_custom_date_range(DateRange::new(*first, window_end)?)?;
            let samples = self.sampler.scan_all_points()?;
            *samples_collected += samples.len();
            debug!(
                start = %first,
                end = %window_end,
                samples = samples.len(),
                "window scanned"
            );
            for sample in samples {
                let label = period_label(frequency, sample.date);
                if let Ok(position) = index.dates().binary_search(&label) {
                    let slot = &mut slots[position];
                    if slot.is_none() {
                        *slot = Some(sample.value);
                    }
                }
            }
        }

        let missing_edge = [slots.first(), slots.last()]
            .into_iter()
            .any(|slot| slot.is_none_or(Option::is_none));
        if missing_edge {
            return Err(ExtractError::IncompleteCoverage(format!(
                "windowed scans missed the index edges {} / {}",
                index.first(),
                index.last()
            )));
        }
        let alignment = index.fill_sparse(&slots)?;
        alignment.ensure_coverage(self.store.config().max_filled_fraction)?;
        if alignment.filled_points > 0 {
            warn!(
                filled_points = alignment.filled_points,
                index_len = index.len(),
                "index dates without a tooltip reading were interpolated"
            );
        }
        let series = ReconstructedSeries::from_index(index, &alignment.values)?;
        Ok((series, alignment.filled_points))
    }
}

/// Last day belonging to the period labelled `label`.
fn window_end(frequency: Frequency, label: NaiveDate) -> NaiveDate {
    step_period(frequency, label)
        .and_then(|next| next.pred_opt())
        .filter(|end| *end >= label)
        .unwrap_or(label)
}

fn describe_series(run: &mut Run, series: &ReconstructedSeries) {
    run.note("length", series.len());
    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        run.note("start_date", first.date);
        run.note("end_date", last.date);
    }
    if let Some((min, max)) = series.min_max() {
        run.note("min_value", min);
        run.note("max_value", max);
    }
}
