use chart_extract::api::{ChartSnapshot, DomSelectors, ReconstructedSeries, calibrate_snapshot};
use chart_extract::core::path_geometry::anchor_points;
use chart_extract::core::{Frequency, TimeIndex, TooltipSample};
use chart_extract::session::{BrowserSession, FixtureSession, SyntheticChart};
use chrono::{Days, NaiveDate};
use criterion::{Criterion, criterion_group, criterion_main};
use std::fmt::Write as _;
use std::hint::black_box;

fn bench_spline_anchor_points_10k(c: &mut Criterion) {
    let mut d = String::from("M 0 500");
    for i in 1..10_000 {
        let x = i as f64 * 0.25;
        let y = 500.0 - (i as f64 * 0.01).sin() * 200.0;
        let _ = write!(d, " C {} {} {} {} {x} {y}", x - 0.2, y + 1.0, x - 0.1, y - 1.0);
    }

    c.bench_function("spline_anchor_points_10k", |b| {
        b.iter(|| {
            let _ = anchor_points(black_box(&d)).expect("path should parse");
        })
    });
}

fn bench_align_10k_onto_daily_index(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date");
    let end = NaiveDate::from_ymd_opt(2019, 12, 31).expect("valid date");
    let index = TimeIndex::calendar(start, end, Frequency::Daily).expect("index");
    let values: Vec<f64> = (0..10_000).map(|i| 100.0 + (i as f64 * 0.003).cos()).collect();

    c.bench_function("align_10k_onto_daily_index", |b| {
        b.iter(|| {
            let _ = index.align(black_box(&values)).expect("alignment should succeed");
        })
    });
}

fn bench_snapshot_parse_and_calibrate(c: &mut Criterion) {
    let values: Vec<f64> = (0..500).map(|i| 1_000.0 + (i as f64 * 0.1).sin() * 250.0).collect();
    let chart = SyntheticChart::from_values(
        NaiveDate::from_ymd_opt(1990, 1, 1).expect("valid date"),
        Frequency::MonthStart,
        &values,
    )
    .with_date_span("MAX");
    let mut session = FixtureSession::new(chart);
    session
        .navigate("https://example.test/bench/series")
        .expect("navigate");
    let html = session.page_source().expect("page source");
    let selectors = DomSelectors::default();

    c.bench_function("snapshot_parse_and_calibrate_500", |b| {
        b.iter(|| {
            let snapshot = ChartSnapshot::parse(
                black_box(html.clone()),
                "https://example.test/bench/series".to_owned(),
                1,
                &selectors,
            )
            .expect("snapshot should parse");
            let _ = calibrate_snapshot(&snapshot, &selectors).expect("calibration");
        })
    });
}

fn bench_result_from_samples_json_2k(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).expect("valid date");
    let samples: Vec<TooltipSample> = (0..2_000u64)
        .rev()
        .map(|i| TooltipSample {
            date: start + Days::new(i),
            value: 50.0 + (i as f64 * 0.02).sin(),
            pixel_x: i as f64,
            pixel_y: 0.0,
        })
        .collect();

    c.bench_function("series_from_samples_json_2k", |b| {
        b.iter(|| {
            let series = ReconstructedSeries::from_samples(black_box(&samples), Frequency::Daily)
                .expect("series");
            let _ = serde_json::to_string(&series).expect("series json");
        })
    });
}

criterion_group!(
    benches,
    bench_spline_anchor_points_10k,
    bench_align_10k_onto_daily_index,
    bench_snapshot_parse_and_calibrate,
    bench_result_from_samples_json_2k
);
criterion_main!(benches);
