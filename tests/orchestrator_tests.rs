use std::rc::Rc;

use approx::assert_relative_eq;
use chart_extract::api::{
    ChartStateStore, ExtractionOrchestrator, ExtractionOutcome, ExtractionResult, ExtractionStep,
    ExtractorConfig, PageRef, Strategy, compare_series,
};
use chart_extract::core::{ChartType, DateRange, Frequency};
use chart_extract::error::ErrorKind;
use chart_extract::session::{FixtureSession, SyntheticChart, TooltipDateStyle};
use chrono::{Months, NaiveDate};

const PAGE: &str = "https://example.test/united-states/gdp-growth";

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn monthly_values() -> Vec<f64> {
    (0..36)
        .map(|i| 100.0 + f64::from(i) * 1.5 + f64::from(i % 4) * 0.75)
        .collect()
}

fn orchestrator_for(
    chart: SyntheticChart,
    config: ExtractorConfig,
) -> ExtractionOrchestrator<FixtureSession> {
    let store = ChartStateStore::new(FixtureSession::new(chart), config)
        .expect("store")
        .into_shared();
    ExtractionOrchestrator::new(store)
}

fn monthly_orchestrator() -> ExtractionOrchestrator<FixtureSession> {
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &monthly_values());
    orchestrator_for(chart, ExtractorConfig::default())
}

fn success(outcome: ExtractionOutcome) -> ExtractionResult {
    match outcome {
        ExtractionOutcome::Success(result) => result,
        ExtractionOutcome::Failure(failure) => panic!("extraction failed: {failure}"),
    }
}

fn assert_matches_chart(result: &ExtractionResult, values: &[f64]) {
    assert_eq!(result.series.len(), values.len());
    assert_eq!(result.series.first().expect("first").date, ymd(2021, 1, 1));
    assert_eq!(result.series.last().expect("last").date, ymd(2023, 12, 1));
    for (actual, expected) in result.series.values().iter().zip(values) {
        assert_relative_eq!(*actual, *expected, max_relative = 1e-3);
    }
}

#[test]
fn trace_geometry_reconstructs_the_chart() {
    let values = monthly_values();
    let result = success(monthly_orchestrator().extract(
        &PageRef::Url(PAGE.to_owned()),
        Strategy::TraceGeometry,
        None,
    ));

    assert_eq!(result.strategy, Strategy::TraceGeometry);
    assert_eq!(result.series.frequency(), Frequency::MonthStart);
    assert_matches_chart(&result, &values);
    assert_eq!(result.metadata_value("frequency"), Some("MS"));
    assert_eq!(result.metadata_value("frequency_degraded"), Some("false"));
    assert_eq!(result.metadata_value("scale_source"), Some("Extents"));
    assert_eq!(result.metadata_value("zero_crossing"), Some("false"));
    assert_eq!(result.metadata_value("filled_points"), Some("0"));
    assert_eq!(result.metadata_value("length"), Some("36"));
}

#[test]
fn metadata_describes_the_page_in_order() {
    let result = success(monthly_orchestrator().extract(
        &PageRef::Url(PAGE.to_owned()),
        Strategy::TraceGeometry,
        None,
    ));

    assert_eq!(result.metadata_value("url"), Some(PAGE));
    assert_eq!(result.metadata_value("name"), Some("Gdp Growth"));
    assert_eq!(result.metadata_value("country"), Some("United States"));
    assert_eq!(result.metadata_value("strategy"), Some("trace-geometry"));
    assert_eq!(result.metadata_value("title"), Some("Synthetic Indicator"));
    assert_eq!(result.metadata_value("unit"), Some("Points"));
    assert_eq!(result.metadata_value("start_date"), Some("2021-01-01"));
    assert_eq!(result.metadata_value("end_date"), Some("2023-12-01"));
    let keys: Vec<&str> = result.metadata.keys().map(String::as_str).collect();
    assert_eq!(&keys[..4], &["url", "name", "country", "strategy"]);
}

#[test]
fn trace_geometry_anchors_on_zero_crossing() {
    let values: Vec<f64> = (0..24).map(|i| -6.0 + f64::from(i) * 0.5).collect();
    let chart = SyntheticChart::from_values(ymd(2022, 1, 1), Frequency::MonthStart, &values);
    let result = success(
        orchestrator_for(chart, ExtractorConfig::default()).extract(
            &PageRef::Url(PAGE.to_owned()),
            Strategy::TraceGeometry,
            None,
        ),
    );

    assert_eq!(result.metadata_value("zero_crossing"), Some("true"));
    for (actual, expected) in result.series.values().iter().zip(&values) {
        assert_relative_eq!(*actual, *expected, epsilon = 1e-6, max_relative = 1e-6);
    }
}

#[test]
fn tooltip_sampling_reads_every_point() {
    let values = monthly_values();
    let result = success(monthly_orchestrator().extract(
        &PageRef::Url(PAGE.to_owned()),
        Strategy::TooltipSampling,
        None,
    ));
    assert_eq!(result.series.frequency(), Frequency::MonthStart);
    assert_matches_chart(&result, &values);
}

#[test]
fn mixed_strategy_assembles_bounded_windows() {
    let values = monthly_values();
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &values);
    let orchestrator =
        orchestrator_for(chart, ExtractorConfig::default().with_mixed_window_points(12));
    let result = success(orchestrator.extract(
        &PageRef::Url(PAGE.to_owned()),
        Strategy::Mixed,
        None,
    ));

    assert_matches_chart(&result, &values);
    assert_eq!(result.metadata_value("filled_points"), Some("0"));
    let snapshot = orchestrator.store().snapshot().expect("snapshot");
    assert_eq!(
        snapshot.date_span().custom_range(),
        Some(DateRange::new(ymd(2023, 1, 1), ymd(2023, 12, 31)).expect("range"))
    );
}

#[test]
fn custom_range_limits_the_extraction() {
    let range = DateRange::new(ymd(2022, 1, 1), ymd(2022, 12, 31)).expect("range");
    let result = success(monthly_orchestrator().extract(
        &PageRef::Url(PAGE.to_owned()),
        Strategy::TraceGeometry,
        Some(range),
    ));
    assert_eq!(result.series.len(), 12);
    assert_eq!(result.series.first().expect("first").date, ymd(2022, 1, 1));
    assert_relative_eq!(
        result.series.value_on(ymd(2022, 6, 1)).expect("june"),
        monthly_values()[17],
        max_relative = 1e-3
    );
}

#[test]
fn strategies_agree_on_the_same_chart() {
    let orchestrator = monthly_orchestrator();
    let page = PageRef::Url(PAGE.to_owned());
    let traced = success(orchestrator.extract(&page, Strategy::TraceGeometry, None));
    let sampled = success(orchestrator.extract(&page, Strategy::TooltipSampling, None));

    let comparison = compare_series(&traced.series, &sampled.series, 1e-3);
    assert_eq!(comparison.shared_dates, 36);
    assert!(comparison.agrees(), "{comparison:?}");
}

#[test]
fn ambiguous_trace_fails_before_reconciling() {
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &monthly_values())
        .with_duplicate_trace(true);
    let outcome = orchestrator_for(chart, ExtractorConfig::default()).extract(
        &PageRef::Url(PAGE.to_owned()),
        Strategy::TraceGeometry,
        None,
    );

    let failure = outcome.failure().expect("failure");
    assert_eq!(failure.step, ExtractionStep::ExtractTrace);
    assert_eq!(failure.kind, ErrorKind::AmbiguousDom);
    assert!(failure.partial.completed.contains(&ExtractionStep::CalibrateAxis));
    assert!(!failure.partial.completed.contains(&ExtractionStep::Reconcile));
    assert!(failure.partial.endpoints.is_some());
    assert!(failure.partial.calibration.is_some());
    assert_eq!(failure.partial.trace_points, None);
}

#[test]
fn unreachable_page_fails_at_load() {
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &monthly_values());
    let store = ChartStateStore::new(
        FixtureSession::new(chart).unreachable(),
        ExtractorConfig::default(),
    )
    .expect("store")
    .into_shared();
    let outcome = ExtractionOrchestrator::new(Rc::clone(&store)).extract(
        &PageRef::Id("united-states/gdp-growth".to_owned()),
        Strategy::Mixed,
        None,
    );

    let failure = outcome.failure().expect("failure");
    assert_eq!(failure.strategy, Strategy::Mixed);
    assert_eq!(failure.step, ExtractionStep::LoadPage);
    assert_eq!(failure.kind, ErrorKind::SessionLost);
    assert!(failure.partial.completed.is_empty());
    assert!(failure.to_string().starts_with("mixed strategy failed at LoadPage"));
}

#[test]
fn result_round_trips_through_the_json_contract() {
    let result = success(monthly_orchestrator().extract(
        &PageRef::Url(PAGE.to_owned()),
        Strategy::TooltipSampling,
        None,
    ));

    let enveloped = result.to_json_contract_v1_pretty().expect("contract");
    assert!(enveloped.contains("\"schema_version\": 1"));
    assert!(enveloped.contains("\"tooltip-sampling\""));
    let decoded = ExtractionResult::from_json_compat_str(&enveloped).expect("decode envelope");
    assert_eq!(decoded, result);

    let bare = result.to_json_pretty().expect("bare");
    let decoded = ExtractionResult::from_json_compat_str(&bare).expect("decode bare");
    assert_eq!(decoded.metadata, result.metadata);

    let future = enveloped.replacen("\"schema_version\": 1", "\"schema_version\": 2", 1);
    let err = ExtractionResult::from_json_compat_str(&future).expect_err("unknown version");
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn spline_charts_are_traced_through_the_configured_type() {
    let values = monthly_values();
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &values)
        .with_chart_type(ChartType::Area);
    let config = ExtractorConfig::default().with_trace_chart_type(ChartType::Spline);
    let orchestrator = orchestrator_for(chart, config);
    let result = success(orchestrator.extract(
        &PageRef::Url(PAGE.to_owned()),
        Strategy::TraceGeometry,
        None,
    ));

    assert_matches_chart(&result, &values);
    let snapshot = orchestrator.store().snapshot().expect("snapshot");
    assert_eq!(snapshot.chart_type(), Some(ChartType::Spline));
}

fn period_dates(start: NaiveDate, months_per_period: u32, count: usize) -> Vec<NaiveDate> {
    (0..count as u32)
        .map(|i| {
            start
                .checked_add_months(Months::new(i * months_per_period))
                .expect("valid date")
        })
        .collect()
}

fn extract_styled(
    frequency: Frequency,
    style: TooltipDateStyle,
    values: &[f64],
    strategy: Strategy,
) -> ExtractionResult {
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), frequency, values)
        .with_date_style(style);
    let config = ExtractorConfig::default().with_mixed_window_points(12);
    success(orchestrator_for(chart, config).extract(
        &PageRef::Url(PAGE.to_owned()),
        strategy,
        None,
    ))
}

fn assert_dated_like_chart(result: &ExtractionResult, expected: &[NaiveDate], values: &[f64]) {
    assert_eq!(result.series.dates(), expected);
    for (actual, value) in result.series.values().iter().zip(values) {
        assert_relative_eq!(*actual, *value, max_relative = 1e-3);
    }
}

#[test]
fn month_name_tooltips_date_every_strategy_correctly() {
    let values = monthly_values();
    let expected = period_dates(ymd(2021, 1, 1), 1, values.len());
    for strategy in [Strategy::TraceGeometry, Strategy::TooltipSampling, Strategy::Mixed] {
        let result = extract_styled(Frequency::MonthStart, TooltipDateStyle::Month, &values, strategy);
        assert_eq!(result.series.frequency(), Frequency::MonthStart, "{strategy:?}");
        assert_dated_like_chart(&result, &expected, &values);
        assert_eq!(result.metadata_value("start_date"), Some("2021-01-01"));
        assert_eq!(result.metadata_value("end_date"), Some("2023-12-01"));
    }
}

#[test]
fn quarter_tooltips_date_every_strategy_correctly() {
    let values: Vec<f64> = monthly_values().into_iter().take(12).collect();
    let expected = period_dates(ymd(2021, 1, 1), 3, values.len());
    for strategy in [Strategy::TraceGeometry, Strategy::TooltipSampling, Strategy::Mixed] {
        let result =
            extract_styled(Frequency::QuarterStart, TooltipDateStyle::Quarter, &values, strategy);
        assert_eq!(result.series.frequency(), Frequency::QuarterStart, "{strategy:?}");
        assert_dated_like_chart(&result, &expected, &values);
        assert_eq!(result.metadata_value("end_date"), Some("2023-10-01"));
    }
}
