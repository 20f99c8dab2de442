use approx::assert_relative_eq;
use chart_extract::api::{
    AxisCalibrator, ChartSnapshot, ChartStateStore, DomSelectors, ExtractorConfig,
    calibrate_snapshot,
};
use chart_extract::core::{AxisCalibration, AxisTick, ChartType, Frequency, ScaleSource, pair_ticks};
use chart_extract::error::ErrorKind;
use chart_extract::session::{FixtureSession, SyntheticChart};
use chrono::NaiveDate;

const PAGE: &str = "https://example.test/japan/exports";

fn snapshot_of(svg: &str) -> ChartSnapshot {
    let html = format!("<html><body><div id=\"chart\">{svg}</div></body></html>");
    ChartSnapshot::parse(html, PAGE.to_owned(), 7, &DomSelectors::default()).expect("snapshot")
}

#[test]
fn tick_slopes_average_into_pixel_to_unit() {
    let ticks = [
        AxisTick::new(100.0, 0.0),
        AxisTick::new(50.0, 10.0),
        AxisTick::new(0.0, 20.0),
    ];
    let calibration = AxisCalibration::from_ticks(&ticks, None).expect("calibration");
    assert_relative_eq!(calibration.pixel_to_unit(), 0.2, max_relative = 1e-12);
    assert_eq!(calibration.scale(), (0.2, ScaleSource::TickSlopes));
    assert_relative_eq!(calibration.value_at_screen_y(25.0), 15.0, max_relative = 1e-12);
}

#[test]
fn uneven_tick_spacing_is_averaged() {
    let ticks = [
        AxisTick::new(0.0, 30.0),
        AxisTick::new(49.0, 20.0),
        AxisTick::new(100.0, 10.0),
    ];
    let calibration = AxisCalibration::from_ticks(&ticks, None).expect("calibration");
    let expected = (10.0 / 49.0 + 10.0 / 51.0) / 2.0;
    assert_relative_eq!(calibration.pixel_to_unit(), expected, max_relative = 1e-12);
}

#[test]
fn single_tick_is_insufficient() {
    let err = AxisCalibration::from_ticks(&[AxisTick::new(10.0, 1.0)], None).expect_err("one tick");
    assert_eq!(err.kind(), ErrorKind::CalibrationInsufficient);
}

#[test]
fn labels_without_positions_pair_top_down() {
    let ticks = pair_ticks(&[300.0, 100.0, 200.0], &[(None, 0.0), (None, 20.0), (None, 10.0)]);
    assert_eq!(
        ticks,
        vec![
            AxisTick::new(100.0, 20.0),
            AxisTick::new(200.0, 10.0),
            AxisTick::new(300.0, 0.0),
        ]
    );
}

#[test]
fn svg_axis_is_calibrated_from_last_populated_groups() {
    let snapshot = snapshot_of(
        r#"<svg>
        <g class="highcharts-grid highcharts-yaxis-grid"></g>
        <g class="highcharts-grid highcharts-yaxis-grid">
            <path d="M 60 40 L 660 40"></path>
            <path d="M 60 140 L 660 140"></path>
            <path d="M 60 240 L 660 240"></path>
            <path d="M 60 340 L 660 340"></path>
        </g>
        <g class="highcharts-axis highcharts-yaxis"><path class="highcharts-axis-line" d="M 60 40 L 60 340"></path></g>
        <g class="highcharts-axis highcharts-xaxis"><path class="highcharts-axis-line" d="M 60 340 L 660 340"></path></g>
        <g class="highcharts-axis-labels highcharts-yaxis-labels"></g>
        <g class="highcharts-axis-labels highcharts-yaxis-labels">
            <text y="44">1.5K</text>
            <text y="144">1K</text>
            <text y="244">500</text>
            <text y="344">0</text>
        </g>
        </svg>"#,
    );

    let calibration = calibrate_snapshot(&snapshot, &DomSelectors::default()).expect("calibrate");
    assert_eq!(calibration.revision(), 7);
    assert_eq!(calibration.ticks().len(), 4);
    assert_eq!(calibration.top_tick(), AxisTick::new(40.0, 1500.0));
    assert_eq!(calibration.bottom_tick(), AxisTick::new(340.0, 0.0));
    assert_relative_eq!(calibration.pixel_to_unit(), 5.0, max_relative = 1e-12);

    let (scale, source) = calibration.scale();
    assert_eq!(source, ScaleSource::Extents);
    assert_relative_eq!(scale, 5.0, max_relative = 1e-12);
    let extents = calibration.pixel_extents().expect("extents");
    assert_eq!((extents.y_min, extents.y_max), (40.0, 340.0));
}

#[test]
fn negative_labels_with_unicode_minus_parse() {
    let snapshot = snapshot_of(
        r#"<svg>
        <g class="highcharts-grid highcharts-yaxis-grid">
            <path d="M 0 0 L 100 0"></path>
            <path d="M 0 50 L 100 50"></path>
            <path d="M 0 100 L 100 100"></path>
        </g>
        <g class="highcharts-axis-labels highcharts-yaxis-labels">
            <text>2</text><text>0</text><text>&#8722;2</text>
        </g>
        </svg>"#,
    );
    let calibration = calibrate_snapshot(&snapshot, &DomSelectors::default()).expect("calibrate");
    assert_eq!(calibration.bottom_tick(), AxisTick::new(100.0, -2.0));
    assert_eq!(calibration.scale().1, ScaleSource::TickSlopes);
    assert_relative_eq!(calibration.value_at_screen_y(50.0), 0.0, epsilon = 1e-12);
}

#[test]
fn axis_without_labels_is_insufficient() {
    let snapshot = snapshot_of(
        r#"<svg><g class="highcharts-grid highcharts-yaxis-grid"><path d="M 0 0 L 100 0"></path></g></svg>"#,
    );
    let err = calibrate_snapshot(&snapshot, &DomSelectors::default()).expect_err("no labels");
    assert_eq!(err.kind(), ErrorKind::CalibrationInsufficient);
}

#[test]
fn calibrator_reads_the_shared_store_and_estimates_the_data_range() {
    let values = [12_000.0, 15_500.0, 14_250.0, 18_000.0, 16_750.0, 21_000.0];
    let chart = SyntheticChart::from_values(
        NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
        Frequency::MonthStart,
        &values,
    )
    .with_chart_type(ChartType::Line)
    .with_compact_labels(true);
    let store = ChartStateStore::new(FixtureSession::new(chart), ExtractorConfig::default())
        .expect("store")
        .into_shared();
    store.load_page(PAGE).expect("load");

    let calibrator = AxisCalibrator::new(store.clone());
    let calibration = calibrator.calibrate_value_axis().expect("calibrate");
    assert_eq!(calibration.scale().1, ScaleSource::Extents);

    let trace = chart_extract::api::TraceExtractor::new(store.clone())
        .extract_pixel_trace(ChartType::Line)
        .expect("trace");
    let (min, max) = calibrator.data_range(&trace, &calibration).expect("range");
    assert_relative_eq!(min, 12_000.0, max_relative = 1e-9);
    assert_relative_eq!(max, 21_000.0, max_relative = 1e-9);
}

#[test]
fn deserialized_calibration_keeps_the_two_tick_minimum() {
    let ticks = [AxisTick::new(0.0, 20.0), AxisTick::new(100.0, 0.0)];
    let calibration = AxisCalibration::from_ticks(&ticks, None)
        .expect("calibration")
        .with_revision(4);
    let json = serde_json::to_string(&calibration).expect("serialize");
    let decoded: AxisCalibration = serde_json::from_str(&json).expect("decode");
    assert_eq!(decoded, calibration);
    assert_eq!(decoded.revision(), 4);

    let single = r#"{"pixel_to_unit":0.2,"pixel_extents":null,"ticks":[{"pixel":0.0,"value":20.0}],"revision":1}"#;
    assert!(serde_json::from_str::<AxisCalibration>(single).is_err());
    let empty = r#"{"pixel_to_unit":0.2,"pixel_extents":null,"ticks":[],"revision":1}"#;
    assert!(serde_json::from_str::<AxisCalibration>(empty).is_err());
}
