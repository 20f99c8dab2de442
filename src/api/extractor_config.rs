use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::chart_type::ChartType;
use crate::error::{ExtractError, ExtractResult};
use crate::session::RetryPolicy;

/// CSS selectors forming the contract with the charting page.
///
/// A markup change on the page is a protocol change: update these rather
/// than the extractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomSelectors {
    #[serde(default = "default_chart_root")]
    pub chart_root: String,
    #[serde(default = "default_plot_background")]
    pub plot_background: String,
    #[serde(default = "default_y_grid_group")]
    pub y_grid_group: String,
    #[serde(default = "default_gridline")]
    pub gridline: String,
    #[serde(default = "default_y_label_group")]
    pub y_label_group: String,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_y_axis_line")]
    pub y_axis_line: String,
    #[serde(default = "default_x_axis_line")]
    pub x_axis_line: String,
    #[serde(default = "default_series_group")]
    pub series_group: String,
    #[serde(default = "default_tooltip")]
    pub tooltip: String,
    #[serde(default = "default_tooltip_date")]
    pub tooltip_date: String,
    #[serde(default = "default_tooltip_value")]
    pub tooltip_value: String,
    #[serde(default = "default_date_span_container")]
    pub date_span_container: String,
    #[serde(default = "default_date_span_option")]
    pub date_span_option: String,
    #[serde(default = "default_selected_class")]
    pub selected_class: String,
    #[serde(default = "default_widest_date_span")]
    pub widest_date_span: String,
    #[serde(default = "default_chart_type_button")]
    pub chart_type_button: String,
    /// Option selector with a `{kind}` placeholder for the chart kind.
    #[serde(default = "default_chart_type_option")]
    pub chart_type_option: String,
    #[serde(default = "default_custom_start_input")]
    pub custom_start_input: String,
    #[serde(default = "default_custom_end_input")]
    pub custom_end_input: String,
    #[serde(default = "default_custom_range_apply")]
    pub custom_range_apply: String,
}

impl Default for DomSelectors {
    fn default() -> Self {
        Self {
            chart_root: default_chart_root(),
            plot_background: default_plot_background(),
            y_grid_group: default_y_grid_group(),
            gridline: default_gridline(),
            y_label_group: default_y_label_group(),
            label: default_label(),
            y_axis_line: default_y_axis_line(),
            x_axis_line: default_x_axis_line(),
            series_group: default_series_group(),
            tooltip: default_tooltip(),
            tooltip_date: default_tooltip_date(),
            tooltip_value: default_tooltip_value(),
            date_span_container: default_date_span_container(),
            date_span_option: default_date_span_option(),
            selected_class: default_selected_class(),
            widest_date_span: default_widest_date_span(),
            chart_type_button: default_chart_type_button(),
            chart_type_option: default_chart_type_option(),
            custom_start_input: default_custom_start_input(),
            custom_end_input: default_custom_end_input(),
            custom_range_apply: default_custom_range_apply(),
        }
    }
}

impl DomSelectors {
    /// Picker option selector for `chart_type`.
    #[must_use]
    pub fn chart_type_option_for(&self, chart_type: ChartType) -> String {
        self.chart_type_option.replace("{kind}", chart_type.kind())
    }

    /// Trace node selector for `chart_type`, `None` when it draws no trace.
    #[must_use]
    pub fn trace_for(&self, chart_type: ChartType) -> Option<String> {
        chart_type.trace_selector().map(|trace| {
            format!(
                "{}.{} {trace}",
                self.series_group,
                chart_type.series_class()
            )
        })
    }

    /// Selector of the `index`-th (1-based) date-span option.
    #[must_use]
    pub fn date_span_option_at(&self, index: usize) -> String {
        format!(
            "{} {}:nth-of-type({index})",
            self.date_span_container, self.date_span_option
        )
    }
}

/// Bounded waits, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_page_load_ms")]
    pub page_load_ms: u64,
    #[serde(default = "default_element_ms")]
    pub element_ms: u64,
    /// Wait after each pointer move before reading the tooltip.
    #[serde(default = "default_hover_settle_ms")]
    pub hover_settle_ms: u64,
    /// Wait after clicks that redraw the chart.
    #[serde(default = "default_redraw_settle_ms")]
    pub redraw_settle_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load_ms: default_page_load_ms(),
            element_ms: default_element_ms(),
            hover_settle_ms: default_hover_settle_ms(),
            redraw_settle_ms: default_redraw_settle_ms(),
        }
    }
}

impl Timeouts {
    #[must_use]
    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    #[must_use]
    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }

    #[must_use]
    pub fn hover_settle(&self) -> Duration {
        Duration::from_millis(self.hover_settle_ms)
    }

    #[must_use]
    pub fn redraw_settle(&self) -> Duration {
        Duration::from_millis(self.redraw_settle_ms)
    }
}

/// Pointer-scan tuning for the tooltip sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerTuning {
    /// Distinct recent points collected for frequency inference.
    #[serde(default = "default_recent_points")]
    pub recent_points: usize,
    /// Maximum pointer moves per scan.
    #[serde(default = "default_step_budget")]
    pub step_budget: usize,
    /// Date changes observed 1px at a time before stepping adaptively.
    #[serde(default = "default_calibration_changes")]
    pub calibration_changes: usize,
    /// Inset from the plot edges when sampling endpoints.
    #[serde(default = "default_edge_offset_px")]
    pub edge_offset_px: f64,
    #[serde(default = "default_scan_step_px")]
    pub scan_step_px: f64,
    #[serde(default = "default_prefer_scripted")]
    pub prefer_scripted: bool,
}

impl Default for SamplerTuning {
    fn default() -> Self {
        Self {
            recent_points: default_recent_points(),
            step_budget: default_step_budget(),
            calibration_changes: default_calibration_changes(),
            edge_offset_px: default_edge_offset_px(),
            scan_step_px: default_scan_step_px(),
            prefer_scripted: default_prefer_scripted(),
        }
    }
}

/// Public extractor configuration.
///
/// Serializable so callers can keep selector overrides and tuning in a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub selectors: DomSelectors,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub sampler: SamplerTuning,
    /// Index dates covered by one bounded-range scan in the mixed strategy.
    #[serde(default = "default_mixed_window_points")]
    pub mixed_window_points: usize,
    /// Chart type forced before reading the trace.
    #[serde(default = "default_trace_chart_type")]
    pub trace_chart_type: ChartType,
    /// Largest share of index dates that may be interpolated before a
    /// series is reported as incomplete.
    #[serde(default = "default_max_filled_fraction")]
    pub max_filled_fraction: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            selectors: DomSelectors::default(),
            timeouts: Timeouts::default(),
            retry: RetryPolicy::default(),
            sampler: SamplerTuning::default(),
            mixed_window_points: default_mixed_window_points(),
            trace_chart_type: default_trace_chart_type(),
            max_filled_fraction: default_max_filled_fraction(),
        }
    }
}

impl ExtractorConfig {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: SamplerTuning) -> Self {
        self.sampler = sampler;
        self
    }

    #[must_use]
    pub fn with_trace_chart_type(mut self, chart_type: ChartType) -> Self {
        self.trace_chart_type = chart_type;
        self
    }

    #[must_use]
    pub fn with_mixed_window_points(mut self, points: usize) -> Self {
        self.mixed_window_points = points;
        self
    }

    #[must_use]
    pub fn with_max_filled_fraction(mut self, fraction: f64) -> Self {
        self.max_filled_fraction = fraction;
        self
    }

    pub fn validate(&self) -> ExtractResult<()> {
        self.retry.validate()?;
        if self.trace_chart_type.trace_selector().is_none() {
            return Err(ExtractError::InvalidData(format!(
                "trace chart type `{}` draws no trace path",
                self.trace_chart_type
            )));
        }
        if !self.selectors.chart_type_option.contains("{kind}") {
            return Err(ExtractError::InvalidData(
                "chart_type_option selector must contain `{kind}`".to_owned(),
            ));
        }
        if self.sampler.recent_points < 2 {
            return Err(ExtractError::InvalidData(
                "sampler recent_points must be >= 2".to_owned(),
            ));
        }
        if self.sampler.step_budget == 0 {
            return Err(ExtractError::InvalidData(
                "sampler step_budget must be > 0".to_owned(),
            ));
        }
        if !self.sampler.edge_offset_px.is_finite() || self.sampler.edge_offset_px < 0.0 {
            return Err(ExtractError::InvalidData(
                "sampler edge_offset_px must be finite and >= 0".to_owned(),
            ));
        }
        if !self.sampler.scan_step_px.is_finite() || self.sampler.scan_step_px < 1.0 {
            return Err(ExtractError::InvalidData(
                "sampler scan_step_px must be finite and >= 1".to_owned(),
            ));
        }
        if self.mixed_window_points < 2 {
            return Err(ExtractError::InvalidData(
                "mixed_window_points must be >= 2".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_filled_fraction) {
            return Err(ExtractError::InvalidData(
                "max_filled_fraction must be within 0..=1".to_owned(),
            ));
        }
        Ok(())
    }

    /// Serializes config to pretty JSON.
    pub fn to_json_pretty(&self) -> ExtractResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ExtractError::InvalidData(format!("failed to serialize config: {e}")))
    }

    /// Deserializes config from JSON; missing fields take defaults.
    pub fn from_json_str(input: &str) -> ExtractResult<Self> {
        serde_json::from_str(input)
            .map_err(|e| ExtractError::InvalidData(format!("failed to parse config: {e}")))
    }
}

fn default_base_url() -> String {
    "https://tradingeconomics.com/".to_owned()
}

fn default_chart_root() -> String {
    "#chart".to_owned()
}

fn default_plot_background() -> String {
    ".highcharts-plot-background".to_owned()
}

fn default_y_grid_group() -> String {
    "g.highcharts-grid.highcharts-yaxis-grid".to_owned()
}

fn default_gridline() -> String {
    "path".to_owned()
}

fn default_y_label_group() -> String {
    "g.highcharts-axis-labels.highcharts-yaxis-labels".to_owned()
}

fn default_label() -> String {
    "text".to_owned()
}

fn default_y_axis_line() -> String {
    "g.highcharts-axis.highcharts-yaxis path.highcharts-axis-line".to_owned()
}

fn default_x_axis_line() -> String {
    "g.highcharts-axis.highcharts-xaxis path.highcharts-axis-line".to_owned()
}

fn default_series_group() -> String {
    "g.highcharts-series".to_owned()
}

fn default_tooltip() -> String {
    ".highcharts-tooltip".to_owned()
}

fn default_tooltip_date() -> String {
    ".tooltip-date".to_owned()
}

fn default_tooltip_value() -> String {
    ".tooltip-value".to_owned()
}

fn default_date_span_container() -> String {
    "#dateSpansDiv".to_owned()
}

fn default_date_span_option() -> String {
    "a".to_owned()
}

fn default_selected_class() -> String {
    "selected".to_owned()
}

fn default_widest_date_span() -> String {
    "MAX".to_owned()
}

fn default_chart_type_button() -> String {
    "#chartTypeBtn".to_owned()
}

fn default_chart_type_option() -> String {
    "#chartTypeMenu a[data-type=\"{kind}\"]".to_owned()
}

fn default_custom_start_input() -> String {
    "#d1Input".to_owned()
}

fn default_custom_end_input() -> String {
    "#d2Input".to_owned()
}

fn default_custom_range_apply() -> String {
    "#datePickerApply".to_owned()
}

fn default_page_load_ms() -> u64 {
    20_000
}

fn default_element_ms() -> u64 {
    5_000
}

fn default_hover_settle_ms() -> u64 {
    25
}

fn default_redraw_settle_ms() -> u64 {
    250
}

fn default_recent_points() -> usize {
    8
}

fn default_step_budget() -> usize {
    2_000
}

fn default_calibration_changes() -> usize {
    3
}

fn default_edge_offset_px() -> f64 {
    1.0
}

fn default_scan_step_px() -> f64 {
    1.0
}

fn default_prefer_scripted() -> bool {
    true
}

fn default_mixed_window_points() -> usize {
    60
}

fn default_max_filled_fraction() -> f64 {
    0.5
}

fn default_trace_chart_type() -> ChartType {
    ChartType::Line
}
