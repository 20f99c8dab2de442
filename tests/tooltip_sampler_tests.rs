use std::rc::Rc;

use approx::assert_relative_eq;
use chart_extract::api::{ChartStateStore, ExtractorConfig, TooltipSampler};
use chart_extract::core::{ChartType, Frequency};
use chart_extract::error::ErrorKind;
use chart_extract::session::{FixtureSession, SyntheticChart, TooltipDateStyle};
use chrono::NaiveDate;

const PAGE: &str = "https://example.test/euro-area/unemployment-rate";

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn wavy(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| 50.0 + ((i * 37) % 11) as f64 * 2.25 - (i % 3) as f64)
        .collect()
}

fn loaded(chart: SyntheticChart) -> Rc<ChartStateStore<FixtureSession>> {
    let store = ChartStateStore::new(FixtureSession::new(chart), ExtractorConfig::default())
        .expect("store")
        .into_shared();
    store.load_page(PAGE).expect("load");
    store.select_widest_date_span().expect("max span");
    store
}

#[test]
fn endpoints_switch_to_line_and_carry_the_unit() {
    let values = wavy(8);
    let chart = SyntheticChart::from_values(ymd(2020, 1, 1), Frequency::QuarterStart, &values)
        .with_chart_type(ChartType::Column)
        .with_date_style(TooltipDateStyle::Quarter)
        .with_unit("Percent");
    let store = loaded(chart);

    let endpoints = TooltipSampler::new(store.clone())
        .first_last_dates()
        .expect("endpoints");

    assert_eq!(endpoints.start.date, ymd(2020, 1, 1));
    assert_eq!(endpoints.end.date, ymd(2021, 10, 1));
    assert_relative_eq!(endpoints.start.value, values[0], max_relative = 1e-12);
    assert_relative_eq!(endpoints.end.value, values[7], max_relative = 1e-12);
    assert_eq!(endpoints.unit.as_deref(), Some("Percent"));
    let snapshot = store.snapshot().expect("snapshot");
    assert_eq!(snapshot.chart_type(), Some(ChartType::Line));
}

#[test]
fn stepped_scan_reads_every_point() {
    let values = wavy(24);
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &values)
        .with_chart_type(ChartType::Line)
        .with_date_style(TooltipDateStyle::Month);
    let store = loaded(chart);

    let samples = TooltipSampler::new(store.clone())
        .scan_all_points()
        .expect("scan");

    assert_eq!(samples.len(), 24);
    assert_eq!(samples[0].date, ymd(2021, 1, 1));
    assert_eq!(samples[23].date, ymd(2022, 12, 1));
    for (sample, expected) in samples.iter().zip(&values) {
        assert_relative_eq!(sample.value, *expected, max_relative = 1e-12);
    }
    let moves = store.with_session(|session| session.pointer_moves());
    assert!(moves > 24);
    assert!(moves < 600, "adaptive step should shorten the walk, took {moves}");
}

#[test]
fn scripted_scan_matches_the_stepped_walk() {
    let values = wavy(24);
    let base = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &values)
        .with_chart_type(ChartType::Line);

    let stepped_store = loaded(base.clone());
    let scripted_store = loaded(base.with_scripted_scan(true));
    let stepped = TooltipSampler::new(stepped_store)
        .scan_all_points()
        .expect("stepped");
    let scripted = TooltipSampler::new(scripted_store.clone())
        .scan_all_points()
        .expect("scripted");

    let dates = |samples: &[chart_extract::core::TooltipSample]| {
        samples.iter().map(|sample| sample.date).collect::<Vec<_>>()
    };
    assert_eq!(dates(&stepped), dates(&scripted));
    assert_eq!(scripted_store.with_session(|session| session.pointer_moves()), 0);
}

#[test]
fn recent_points_scan_right_of_centre() {
    let values = wavy(24);
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &values)
        .with_chart_type(ChartType::Line);
    let store = loaded(chart);

    let recent = TooltipSampler::new(store)
        .sample_recent_points(5)
        .expect("recent");

    assert_eq!(recent.len(), 5);
    assert!(recent.windows(2).all(|pair| pair[0].date < pair[1].date));
    assert!(recent[0].date >= ymd(2021, 12, 1));
}

#[test]
fn daily_points_survive_the_adaptive_step() {
    let values = wavy(60);
    let chart = SyntheticChart::from_values(ymd(2024, 1, 1), Frequency::Daily, &values)
        .with_chart_type(ChartType::Line);
    let store = loaded(chart);

    let samples = TooltipSampler::new(store)
        .scan_all_points()
        .expect("scan");
    assert_eq!(samples.len(), 60);
    assert_eq!(samples[59].date, ymd(2024, 2, 29));
}

#[test]
fn yearly_tooltips_resolve_to_january_first() {
    let chart = SyntheticChart::from_values(ymd(2015, 1, 1), Frequency::YearStart, &wavy(6))
        .with_chart_type(ChartType::Line)
        .with_date_style(TooltipDateStyle::Year);
    let store = loaded(chart);

    let endpoints = TooltipSampler::new(store)
        .first_last_dates()
        .expect("endpoints");
    assert_eq!(endpoints.start.date, ymd(2015, 1, 1));
    assert_eq!(endpoints.end.date, ymd(2020, 1, 1));
}

#[test]
fn pointer_outside_the_plot_reads_an_empty_tooltip() {
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &wavy(12))
        .with_chart_type(ChartType::Line);
    let store = loaded(chart);
    let sampler = TooltipSampler::new(store.clone());

    assert_eq!(sampler.read_tooltip_at(1.0, 1.0).expect("read"), None);
    let paused_before = store.with_session(|session| session.paused());
    let err = sampler.sample_at(1.0, 1.0).expect_err("empty tooltip");
    assert_eq!(err.kind(), ErrorKind::TooltipEmpty);
    assert!(store.with_session(|session| session.paused()) > paused_before);
}

#[test]
fn plot_rect_is_reported_in_viewport_space() {
    let chart = SyntheticChart::from_values(ymd(2021, 1, 1), Frequency::MonthStart, &wavy(12));
    let store = loaded(chart);
    let rect = TooltipSampler::new(store).plot_rect().expect("rect");
    assert_eq!((rect.x, rect.y, rect.width, rect.height), (70.0, 190.0, 600.0, 300.0));
}
