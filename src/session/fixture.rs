//! Deterministic stand-in for a live charting page.
//!
//! `SyntheticChart` holds the series and the page's UI state and renders a
//! Highcharts-style document from it: date-span presets, chart-type picker,
//! custom range inputs, y-axis gridlines and labels, axis lines, the series
//! group and the hover tooltip. `FixtureSession` answers `BrowserSession`
//! calls against that document and mutates the state on clicks and pointer
//! moves, so interactions behave as they would on the live page.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use scraper::{ElementRef, Html};
use serde_json::{Value, json};

use crate::core::chart_type::ChartType;
use crate::core::frequency::Frequency;
use crate::core::primitives::date_to_days;
use crate::core::time_index::step_period;
use crate::core::tooltip_text::parse_selector;
use crate::core::types::{DateRange, PixelRect};
use crate::error::{ExtractError, ExtractResult};
use crate::session::BrowserSession;
use crate::session::scripts::embedded_request;

const DATE_SPAN_PRESETS: [(&str, Option<i64>); 4] = [
    ("1Y", Some(365)),
    ("5Y", Some(5 * 365)),
    ("10Y", Some(10 * 365)),
    ("MAX", None),
];

/// How tooltip dates are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TooltipDateStyle {
    /// `Jan 07 2024`
    Day,
    /// `January 2024`
    Month,
    /// `Q3 2024`
    Quarter,
    /// `2024`
    Year,
}

impl TooltipDateStyle {
    fn format(self, date: NaiveDate) -> String {
        match self {
            Self::Day => date.format("%b %d %Y").to_string(),
            Self::Month => date.format("%B %Y").to_string(),
            Self::Quarter => format!("Q{} {}", (date.month() - 1) / 3 + 1, date.year()),
            Self::Year => date.year().to_string(),
        }
    }
}

/// Series plus UI state of the synthetic page.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticChart {
    pub points: Vec<(NaiveDate, f64)>,
    pub title: String,
    pub unit: String,
    pub chart_type: ChartType,
    pub date_span: Option<String>,
    pub custom_range: Option<DateRange>,
    pub date_style: TooltipDateStyle,
    pub value_decimals: usize,
    pub compact_labels: bool,
    /// Plot area in SVG user space.
    pub plot: PixelRect,
    /// Top-left corner of the SVG root in the viewport.
    pub svg_offset: (f64, f64),
    /// Renders a second series group with its own trace.
    pub duplicate_trace: bool,
    /// Renders an empty gridline group ahead of the real one.
    pub navigator_grid: bool,
    /// Lets `execute_script` emulate the in-page scan.
    pub scripted_scan: bool,
}

impl SyntheticChart {
    #[must_use]
    pub fn new(mut points: Vec<(NaiveDate, f64)>) -> Self {
        points.sort_by_key(|(date, _)| *date);
        points.dedup_by_key(|(date, _)| *date);
        Self {
            points,
            title: "Synthetic Indicator".to_owned(),
            unit: "Points".to_owned(),
            chart_type: ChartType::Spline,
            date_span: Some("1Y".to_owned()),
            custom_range: None,
            date_style: TooltipDateStyle::Day,
            value_decimals: 2,
            compact_labels: false,
            plot: PixelRect::new(60.0, 40.0, 600.0, 300.0),
            svg_offset: (10.0, 150.0),
            duplicate_trace: false,
            navigator_grid: true,
            scripted_scan: false,
        }
    }

    /// Series of `values` stepping one `frequency` period from `start`.
    #[must_use]
    pub fn from_values(start: NaiveDate, frequency: Frequency, values: &[f64]) -> Self {
        let mut points = Vec::with_capacity(values.len());
        let mut date = Some(start);
        for value in values {
            let Some(current) = date else { break };
            points.push((current, *value));
            date = step_period(frequency, current);
        }
        Self::new(points)
    }

    #[must_use]
    pub fn with_chart_type(mut self, chart_type: ChartType) -> Self {
        self.chart_type = chart_type;
        self
    }

    #[must_use]
    pub fn with_date_style(mut self, style: TooltipDateStyle) -> Self {
        self.date_style = style;
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_date_span(mut self, preset: &str) -> Self {
        self.date_span = Some(preset.to_owned());
        self
    }

    #[must_use]
    pub fn with_compact_labels(mut self, compact: bool) -> Self {
        self.compact_labels = compact;
        self
    }

    #[must_use]
    pub fn with_duplicate_trace(mut self, duplicate: bool) -> Self {
        self.duplicate_trace = duplicate;
        self
    }

    #[must_use]
    pub fn with_scripted_scan(mut self, scripted: bool) -> Self {
        self.scripted_scan = scripted;
        self
    }

    #[must_use]
    pub fn with_value_decimals(mut self, decimals: usize) -> Self {
        self.value_decimals = decimals;
        self
    }

    /// Points inside the active date span or custom range.
    #[must_use]
    pub fn visible_points(&self) -> Vec<(NaiveDate, f64)> {
        if let Some(range) = self.custom_range {
            return self
                .points
                .iter()
                .copied()
                .filter(|(date, _)| range.contains(*date))
                .collect();
        }
        let Some(last) = self.points.last().map(|(date, _)| *date) else {
            return Vec::new();
        };
        let window = self.date_span.as_deref().and_then(|label| {
            DATE_SPAN_PRESETS
                .iter()
                .find(|(preset, _)| *preset == label)
                .and_then(|(_, days)| *days)
        });
        match window {
            Some(days) => {
                let cutoff = date_to_days(last) - days;
                self.points
                    .iter()
                    .copied()
                    .filter(|(date, _)| date_to_days(*date) >= cutoff)
                    .collect()
            }
            None => self.points.clone(),
        }
    }

    /// Ticks (low to high) for the visible values.
    #[must_use]
    pub fn axis_ticks(&self) -> Vec<f64> {
        let visible = self.visible_points();
        let min = visible.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
        let max = visible.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            return vec![0.0, 1.0];
        }
        nice_ticks(min, max)
    }

    fn value_to_svg_y(&self, value: f64, ticks: &[f64]) -> f64 {
        let lo = ticks[0];
        let hi = ticks[ticks.len() - 1];
        self.plot.y + self.plot.height * (hi - value) / (hi - lo)
    }

    /// Trace vertices relative to the series group origin.
    fn trace_vertices(&self) -> Vec<(f64, f64)> {
        let visible = self.visible_points();
        let ticks = self.axis_ticks();
        let (Some(first), Some(last)) = (visible.first(), visible.last()) else {
            return Vec::new();
        };
        let first_day = date_to_days(first.0) as f64;
        let span = (date_to_days(last.0) as f64 - first_day).max(1.0);
        visible
            .iter()
            .map(|(date, value)| {
                let x = if visible.len() == 1 {
                    self.plot.width / 2.0
                } else {
                    self.plot.width * (date_to_days(*date) as f64 - first_day) / span
                };
                (x, self.value_to_svg_y(*value, &ticks) - self.plot.y)
            })
            .collect()
    }

    fn tooltip_at(&self, viewport_x: f64, viewport_y: f64) -> Option<(String, String)> {
        let left = self.svg_offset.0 + self.plot.x;
        let top = self.svg_offset.1 + self.plot.y;
        let inside = viewport_x >= left
            && viewport_x <= left + self.plot.width
            && viewport_y >= top
            && viewport_y <= top + self.plot.height;
        if !inside {
            return None;
        }
        let visible = self.visible_points();
        let vertices = self.trace_vertices();
        let local_x = viewport_x - left;
        let (index, _) = vertices.iter().enumerate().min_by(|(_, lhs), (_, rhs)| {
            (lhs.0 - local_x).abs().total_cmp(&(rhs.0 - local_x).abs())
        })?;
        let (date, value) = visible[index];
        Some((
            self.date_style.format(date),
            format!("{value:.prec$} {}", self.unit, prec = self.value_decimals)
                .trim()
                .to_owned(),
        ))
    }
}

fn nice_ticks(min: f64, max: f64) -> Vec<f64> {
    let (min, max) = if (max - min).abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min, max)
    };
    let raw = (max - min) / 4.0;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|step| *step >= raw)
        .unwrap_or(10.0 * magnitude);
    let lo = (min / step).floor() * step;
    let hi = (max / step).ceil() * step;
    let count = ((hi - lo) / step).round() as usize;
    (0..=count)
        .map(|i| ((lo + step * i as f64) * 1e9).round() / 1e9)
        .collect()
}

fn format_tick_label(value: f64, compact: bool) -> String {
    let sign = if value < 0.0 { "\u{2212}" } else { "" };
    let magnitude = value.abs();
    let trim = |text: String| -> String {
        if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_owned()
        } else {
            text
        }
    };
    if compact && magnitude >= 1e3 {
        let (divisor, suffix) = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")]
            .into_iter()
            .find(|(divisor, _)| magnitude >= *divisor)
            .unwrap_or((1e3, "K"));
        return format!("{sign}{}{suffix}", trim(format!("{:.3}", magnitude / divisor)));
    }
    let text = trim(format!("{magnitude:.4}"));
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let mut grouped = String::new();
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}

fn spline_path(vertices: &[(f64, f64)]) -> String {
    let mut d = String::new();
    for (i, (x, y)) in vertices.iter().enumerate() {
        if i == 0 {
            let _ = write!(d, "M {x} {y}");
            continue;
        }
        let (px, py) = vertices[i - 1];
        let dx = (x - px) / 3.0;
        let _ = write!(d, " C {} {py} {} {y} {x} {y}", px + dx, x - dx);
    }
    d
}

fn line_path(vertices: &[(f64, f64)]) -> String {
    let mut d = String::new();
    for (i, (x, y)) in vertices.iter().enumerate() {
        let command = if i == 0 { "M" } else { " L" };
        let _ = write!(d, "{command} {x} {y}");
    }
    d
}

/// UI state that only exists while a page is loaded.
#[derive(Debug, Clone, Default, PartialEq)]
struct PageState {
    url: Option<String>,
    pointer: Option<(f64, f64)>,
    chart_type_menu_open: bool,
    start_input: String,
    end_input: String,
}

/// `BrowserSession` over a [`SyntheticChart`].
#[derive(Debug, Clone)]
pub struct FixtureSession {
    chart: SyntheticChart,
    page: PageState,
    initial_chart: SyntheticChart,
    closed: bool,
    unreachable: bool,
    flaky: Vec<(String, u32)>,
    clicks: Vec<String>,
    pointer_moves: usize,
    paused: Duration,
}

impl FixtureSession {
    #[must_use]
    pub fn new(chart: SyntheticChart) -> Self {
        Self {
            initial_chart: chart.clone(),
            chart,
            page: PageState::default(),
            closed: false,
            unreachable: false,
            flaky: Vec::new(),
            clicks: Vec::new(),
            pointer_moves: 0,
            paused: Duration::ZERO,
        }
    }

    /// Navigation fails as if the host could not be reached.
    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// `selector` reports missing for the next `failures` waits or clicks.
    #[must_use]
    pub fn with_flaky_selector(mut self, selector: &str, failures: u32) -> Self {
        self.flaky.push((selector.to_owned(), failures));
        self
    }

    /// Invalidates the handle; every later call fails with `SessionLost`.
    pub fn close(&mut self) {
        self.closed = true;
    }

    #[must_use]
    pub fn chart(&self) -> &SyntheticChart {
        &self.chart
    }

    /// Mutates the page behind the session's back, as live data would.
    pub fn chart_mut(&mut self) -> &mut SyntheticChart {
        &mut self.chart
    }

    #[must_use]
    pub fn clicks(&self) -> &[String] {
        &self.clicks
    }

    #[must_use]
    pub fn pointer_moves(&self) -> usize {
        self.pointer_moves
    }

    #[must_use]
    pub fn paused(&self) -> Duration {
        self.paused
    }

    fn ensure_open(&self) -> ExtractResult<()> {
        if self.closed {
            return Err(ExtractError::SessionLost("browser handle closed".to_owned()));
        }
        Ok(())
    }

    fn take_flaky(&mut self, selector: &str) -> ExtractResult<()> {
        if let Some((_, remaining)) = self
            .flaky
            .iter_mut()
            .find(|(flaky, remaining)| flaky == selector && *remaining > 0)
        {
            *remaining -= 1;
            return Err(ExtractError::ElementMissing {
                selector: selector.to_owned(),
            });
        }
        Ok(())
    }

    /// Renders the current document.
    #[must_use]
    pub fn render(&self) -> String {
        if self.page.url.is_none() {
            return "<html><head></head><body></body></html>".to_owned();
        }
        let chart = &self.chart;
        let mut html = String::new();
        let _ = write!(
            html,
            "<html><head><title>{}</title></head><body>",
            chart.title
        );

        html.push_str("<div id=\"dateSpansDiv\">");
        for (label, _) in DATE_SPAN_PRESETS {
            let selected = chart.custom_range.is_none() && chart.date_span.as_deref() == Some(label);
            let class = if selected {
                "te-date-span selected"
            } else {
                "te-date-span"
            };
            let _ = write!(html, "<a class=\"{class}\">{label}</a>");
        }
        html.push_str("</div>");

        html.push_str("<div id=\"chartTypePicker\"><button id=\"chartTypeBtn\">Chart type</button>");
        if self.page.chart_type_menu_open {
            html.push_str("<div id=\"chartTypeMenu\" class=\"open\">");
            for kind in ChartType::ALL {
                let _ = write!(
                    html,
                    "<a class=\"chart-type-option\" data-type=\"{}\">{}</a>",
                    kind.kind(),
                    kind.label()
                );
            }
            html.push_str("</div>");
        }
        html.push_str("</div>");

        let _ = write!(
            html,
            "<div id=\"dateRangePicker\"><input id=\"d1Input\" value=\"{}\"><input id=\"d2Input\" value=\"{}\"><button id=\"datePickerApply\">Apply</button></div>",
            self.page.start_input, self.page.end_input
        );

        html.push_str("<div id=\"chart\">");
        self.render_svg(&mut html);
        html.push_str("<div class=\"highcharts-tooltip\">");
        if let Some((date, value)) = self
            .page
            .pointer
            .and_then(|(x, y)| chart.tooltip_at(x, y))
        {
            let _ = write!(
                html,
                "<span class=\"tooltip-date\">{date}</span><span class=\"tooltip-value\">{value}</span>"
            );
        }
        html.push_str("</div></div></body></html>");
        html
    }

    fn render_svg(&self, html: &mut String) {
        let chart = &self.chart;
        let plot = chart.plot;
        let ticks = chart.axis_ticks();
        let _ = write!(
            html,
            "<svg class=\"highcharts-root\" width=\"{}\" height=\"{}\">",
            plot.right() + 40.0,
            plot.bottom() + 40.0
        );
        let _ = write!(
            html,
            "<rect class=\"highcharts-plot-background\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"></rect>",
            plot.x, plot.y, plot.width, plot.height
        );

        if chart.navigator_grid {
            html.push_str("<g class=\"highcharts-grid highcharts-yaxis-grid\"></g>");
        }
        html.push_str("<g class=\"highcharts-grid highcharts-yaxis-grid\">");
        for tick in ticks.iter().rev() {
            let y = chart.value_to_svg_y(*tick, &ticks);
            let _ = write!(
                html,
                "<path class=\"highcharts-grid-line\" d=\"M {} {y} L {} {y}\"></path>",
                plot.left(),
                plot.right()
            );
        }
        html.push_str("</g>");

        let _ = write!(
            html,
            "<g class=\"highcharts-axis highcharts-yaxis\"><path class=\"highcharts-axis-line\" d=\"M {} {} L {} {}\"></path></g>",
            plot.left(),
            plot.top(),
            plot.left(),
            plot.bottom()
        );
        let _ = write!(
            html,
            "<g class=\"highcharts-axis highcharts-xaxis\"><path class=\"highcharts-axis-line\" d=\"M {} {} L {} {}\"></path></g>",
            plot.left(),
            plot.bottom(),
            plot.right(),
            plot.bottom()
        );

        html.push_str("<g class=\"highcharts-series-group\">");
        let groups = if chart.duplicate_trace { 2 } else { 1 };
        for group in 0..groups {
            self.render_series_group(html, group);
        }
        html.push_str("</g>");

        if chart.navigator_grid {
            html.push_str("<g class=\"highcharts-axis-labels highcharts-yaxis-labels\"></g>");
        }
        html.push_str("<g class=\"highcharts-axis-labels highcharts-yaxis-labels\">");
        for tick in ticks.iter().rev() {
            let y = chart.value_to_svg_y(*tick, &ticks) + 4.0;
            let _ = write!(
                html,
                "<text x=\"{}\" y=\"{y}\" text-anchor=\"end\">{}</text>",
                plot.left() - 8.0,
                format_tick_label(*tick, chart.compact_labels)
            );
        }
        html.push_str("</g></svg>");
    }

    fn render_series_group(&self, html: &mut String, group: usize) {
        let chart = &self.chart;
        let vertices = chart.trace_vertices();
        let _ = write!(
            html,
            "<g class=\"highcharts-series highcharts-series-{group} {} highcharts-tracker\" transform=\"translate({},{}) scale(1 1)\">",
            chart.chart_type.series_class(),
            chart.plot.x,
            chart.plot.y
        );
        match chart.chart_type {
            ChartType::Line => {
                let _ = write!(
                    html,
                    "<path class=\"highcharts-graph\" d=\"{}\"></path>",
                    line_path(&vertices)
                );
            }
            ChartType::Spline => {
                let _ = write!(
                    html,
                    "<path class=\"highcharts-graph\" d=\"{}\"></path>",
                    spline_path(&vertices)
                );
            }
            ChartType::Area => {
                if let (Some(first), Some(last)) = (vertices.first(), vertices.last()) {
                    let _ = write!(
                        html,
                        "<path class=\"highcharts-area\" d=\"{} L {} {} L {} {} Z\"></path>",
                        line_path(&vertices),
                        last.0,
                        chart.plot.height,
                        first.0,
                        chart.plot.height
                    );
                }
                let _ = write!(
                    html,
                    "<path class=\"highcharts-graph\" d=\"{}\"></path>",
                    line_path(&vertices)
                );
            }
            ChartType::Column | ChartType::Bar => {
                for (x, y) in &vertices {
                    let _ = write!(
                        html,
                        "<rect class=\"highcharts-point\" x=\"{}\" y=\"{y}\" width=\"4\" height=\"{}\"></rect>",
                        x - 2.0,
                        chart.plot.height - y
                    );
                }
            }
            ChartType::Scatter => {
                for (x, y) in &vertices {
                    let _ = write!(
                        html,
                        "<path class=\"highcharts-point\" d=\"M {} {y} L {} {y}\"></path>",
                        x - 2.0,
                        x + 2.0
                    );
                }
            }
        }
        html.push_str("</g>");
    }

    fn with_first_match<T>(
        &self,
        selector: &str,
        f: impl FnOnce(ElementRef<'_>) -> T,
    ) -> ExtractResult<Option<T>> {
        let parsed = parse_selector(selector)?;
        let document = Html::parse_document(&self.render());
        Ok(document.select(&parsed).next().map(f))
    }

    fn dispatch_click(&mut self, classes: &[String], id: Option<&str>, text: &str, data_type: Option<&str>) {
        let has_class = |name: &str| classes.iter().any(|class| class == name);
        if has_class("te-date-span") {
            self.chart.date_span = Some(text.trim().to_owned());
            self.chart.custom_range = None;
        } else if has_class("chart-type-option") {
            if let Some(kind) = data_type.and_then(|kind| kind.parse::<ChartType>().ok()) {
                self.chart.chart_type = kind;
            }
            self.page.chart_type_menu_open = false;
        } else if id == Some("chartTypeBtn") {
            self.page.chart_type_menu_open = !self.page.chart_type_menu_open;
        } else if id == Some("datePickerApply") {
            let start = NaiveDate::parse_from_str(self.page.start_input.trim(), "%Y-%m-%d");
            let end = NaiveDate::parse_from_str(self.page.end_input.trim(), "%Y-%m-%d");
            if let (Ok(start), Ok(end)) = (start, end) {
                if let Ok(range) = DateRange::new(start, end) {
                    self.chart.custom_range = Some(range);
                    self.chart.date_span = None;
                }
            }
        }
    }

    fn emulate_scan(&self, script: &str) -> ExtractResult<Value> {
        let request = embedded_request(script).ok_or_else(|| {
            ExtractError::Unsupported("fixture only runs the tooltip scan script".to_owned())
        })?;
        let direction = if request.end_x >= request.start_x { 1.0 } else { -1.0 };
        let step = request.step_px.abs().max(1.0) * direction;
        let mut points = Vec::new();
        let mut last: Option<String> = None;
        let mut x = request.start_x;
        while (direction > 0.0 && x <= request.end_x) || (direction < 0.0 && x >= request.end_x) {
            if let Some((date, value)) = self.chart.tooltip_at(x, request.y) {
                if last.as_deref() != Some(date.as_str()) {
                    points.push(json!({"date": date, "value": value, "x": x, "y": request.y}));
                    last = Some(date);
                    if request.max_points.is_some_and(|max| points.len() >= max) {
                        break;
                    }
                }
            }
            x += step;
        }
        let logs = vec![format!("scanned {} points", points.len())];
        Ok(Value::String(
            json!({"dataPoints": points, "logs": logs}).to_string(),
        ))
    }
}

impl BrowserSession for FixtureSession {
    fn navigate(&mut self, url: &str) -> ExtractResult<()> {
        self.ensure_open()?;
        if self.unreachable {
            return Err(ExtractError::SessionLost(format!("navigation to {url} failed")));
        }
        self.chart = self.initial_chart.clone();
        self.page = PageState {
            url: Some(url.to_owned()),
            ..PageState::default()
        };
        Ok(())
    }

    fn current_url(&self) -> ExtractResult<String> {
        self.ensure_open()?;
        Ok(self
            .page
            .url
            .clone()
            .unwrap_or_else(|| "about:blank".to_owned()))
    }

    fn page_source(&mut self) -> ExtractResult<String> {
        self.ensure_open()?;
        Ok(self.render())
    }

    fn wait_for_selector(&mut self, selector: &str, _timeout: Duration) -> ExtractResult<()> {
        self.ensure_open()?;
        self.take_flaky(selector)?;
        match self.with_first_match(selector, |_| ())? {
            Some(()) => Ok(()),
            None => Err(ExtractError::ElementMissing {
                selector: selector.to_owned(),
            }),
        }
    }

    fn click(&mut self, selector: &str) -> ExtractResult<()> {
        self.ensure_open()?;
        self.take_flaky(selector)?;
        let target = self.with_first_match(selector, |element| {
            let value = element.value();
            (
                value.classes().map(str::to_owned).collect::<Vec<_>>(),
                value.id().map(str::to_owned),
                element.text().collect::<String>(),
                value.attr("data-type").map(str::to_owned),
            )
        })?;
        let Some((classes, id, text, data_type)) = target else {
            return Err(ExtractError::ElementMissing {
                selector: selector.to_owned(),
            });
        };
        self.clicks.push(selector.to_owned());
        self.dispatch_click(&classes, id.as_deref(), &text, data_type.as_deref());
        Ok(())
    }

    fn read_attribute(
        &mut self,
        selector: &str,
        attribute: &str,
    ) -> ExtractResult<Option<String>> {
        self.ensure_open()?;
        self.with_first_match(selector, |element| {
            element.value().attr(attribute).map(str::to_owned)
        })?
        .ok_or_else(|| ExtractError::ElementMissing {
            selector: selector.to_owned(),
        })
    }

    fn outer_html(&mut self, selector: &str) -> ExtractResult<Option<String>> {
        self.ensure_open()?;
        self.with_first_match(selector, |element| element.html())
    }

    fn element_rect(&mut self, selector: &str) -> ExtractResult<PixelRect> {
        self.ensure_open()?;
        let (ox, oy) = self.chart.svg_offset;
        let plot = self.chart.plot;
        let rect = self
            .with_first_match(selector, |element| {
                let value = element.value();
                if value.id() == Some("chart") {
                    return Some(PixelRect::new(
                        ox,
                        oy,
                        plot.right() + 40.0,
                        plot.bottom() + 40.0,
                    ));
                }
                let number = |name: &str| value.attr(name).and_then(|raw| raw.parse::<f64>().ok());
                Some(PixelRect::new(
                    ox + number("x")?,
                    oy + number("y")?,
                    number("width")?,
                    number("height")?,
                ))
            })?
            .ok_or_else(|| ExtractError::ElementMissing {
                selector: selector.to_owned(),
            })?;
        rect.ok_or_else(|| {
            ExtractError::InvalidData(format!("`{selector}` has no box geometry"))
        })
    }

    fn move_pointer(&mut self, x: f64, y: f64) -> ExtractResult<()> {
        self.ensure_open()?;
        self.pointer_moves += 1;
        self.page.pointer = Some((x, y));
        Ok(())
    }

    fn set_input_value(&mut self, selector: &str, value: &str) -> ExtractResult<()> {
        self.ensure_open()?;
        let id = self
            .with_first_match(selector, |element| element.value().id().map(str::to_owned))?
            .ok_or_else(|| ExtractError::ElementMissing {
                selector: selector.to_owned(),
            })?;
        match id.as_deref() {
            Some("d1Input") => self.page.start_input = value.to_owned(),
            Some("d2Input") => self.page.end_input = value.to_owned(),
            _ => {
                return Err(ExtractError::Unsupported(format!(
                    "`{selector}` is not an input"
                )));
            }
        }
        Ok(())
    }

    fn execute_script(&mut self, script: &str) -> ExtractResult<Value> {
        self.ensure_open()?;
        if !self.chart.scripted_scan {
            return Err(ExtractError::Unsupported(
                "fixture session has no script engine".to_owned(),
            ));
        }
        self.emulate_scan(script)
    }

    fn pause(&mut self, duration: Duration) {
        self.paused += duration;
    }
}
