use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Chart types the target page can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Line,
    Spline,
    Area,
    Column,
    Bar,
    Scatter,
}

struct ChartTypeTraits {
    kind: &'static str,
    label: &'static str,
    trace_selector: Option<&'static str>,
    tooltip_geometry: bool,
}

const fn traits(chart_type: ChartType) -> ChartTypeTraits {
    match chart_type {
        ChartType::Line => ChartTypeTraits {
            kind: "line",
            label: "Line",
            trace_selector: Some("path.highcharts-graph"),
            tooltip_geometry: true,
        },
        ChartType::Spline => ChartTypeTraits {
            kind: "spline",
            label: "Spline",
            trace_selector: Some("path.highcharts-graph"),
            tooltip_geometry: false,
        },
        ChartType::Area => ChartTypeTraits {
            kind: "area",
            label: "Area",
            trace_selector: Some("path.highcharts-graph"),
            tooltip_geometry: false,
        },
        ChartType::Column => ChartTypeTraits {
            kind: "column",
            label: "Column",
            trace_selector: None,
            tooltip_geometry: false,
        },
        ChartType::Bar => ChartTypeTraits {
            kind: "bar",
            label: "Bar",
            trace_selector: None,
            tooltip_geometry: false,
        },
        ChartType::Scatter => ChartTypeTraits {
            kind: "scatter",
            label: "Scatter",
            trace_selector: None,
            tooltip_geometry: false,
        },
    }
}

impl ChartType {
    pub const ALL: [ChartType; 6] = [
        ChartType::Line,
        ChartType::Spline,
        ChartType::Area,
        ChartType::Column,
        ChartType::Bar,
        ChartType::Scatter,
    ];

    /// Lowercase kind used in series class names and picker options.
    #[must_use]
    pub fn kind(self) -> &'static str {
        traits(self).kind
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        traits(self).label
    }

    /// Class carried by the series `<g>` group for this type.
    #[must_use]
    pub fn series_class(self) -> String {
        format!("highcharts-{}-series", self.kind())
    }

    /// Selector of the data-trace path inside the series group, if the type
    /// renders one.
    #[must_use]
    pub fn trace_selector(self) -> Option<&'static str> {
        traits(self).trace_selector
    }

    /// Whether pointer-scan geometry (mid-height hover hits the series) holds.
    #[must_use]
    pub fn supports_tooltip_geometry(self) -> bool {
        traits(self).tooltip_geometry
    }

    /// Resolves a chart type from a series group class such as
    /// `highcharts-spline-series`.
    #[must_use]
    pub fn from_series_class(class: &str) -> Option<Self> {
        let kind = class.strip_prefix("highcharts-")?.strip_suffix("-series")?;
        Self::ALL.into_iter().find(|ty| ty.kind() == kind)
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChartType {
    type Err = ExtractError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|ty| ty.kind() == normalized)
            .ok_or_else(|| ExtractError::Parse(format!("unknown chart type `{input}`")))
    }
}
