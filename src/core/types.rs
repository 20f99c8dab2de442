use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, ExtractResult};

/// One vertex of a rendered trace in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle, either in SVG user space or viewport space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    #[must_use]
    pub fn left(self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn right(self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn top(self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn bottom(self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn center_x(self) -> f64 {
        self.x + self.width / 2.0
    }

    #[must_use]
    pub fn center_y(self) -> f64 {
        self.y + self.height / 2.0
    }

    #[must_use]
    pub fn contains(self, x: f64, y: f64) -> bool {
        x >= self.left() && x <= self.right() && y >= self.top() && y <= self.bottom()
    }
}

/// Axis-line endpoints in SVG pixel space.
///
/// `y_min` is the top of the value axis on screen, `y_max` its bottom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelExtents {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl PixelExtents {
    #[must_use]
    pub fn y_span(self) -> f64 {
        self.y_max - self.y_min
    }

    #[must_use]
    pub fn x_span(self) -> f64 {
        self.x_max - self.x_min
    }
}

/// One hover-tooltip observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TooltipSample {
    pub date: NaiveDate,
    pub value: f64,
    pub pixel_x: f64,
    pub pixel_y: f64,
}

/// Start and end observations of the displayed series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointPair {
    pub start: TooltipSample,
    pub end: TooltipSample,
    #[serde(default)]
    pub unit: Option<String>,
}

impl EndpointPair {
    pub fn new(start: TooltipSample, end: TooltipSample) -> ExtractResult<Self> {
        if start.date > end.date {
            return Err(ExtractError::InvalidData(format!(
                "endpoint start {} is after end {}",
                start.date, end.date
            )));
        }
        Ok(Self {
            start,
            end,
            unit: None,
        })
    }

    #[must_use]
    pub fn with_unit(mut self, unit: Option<String>) -> Self {
        self.unit = unit.filter(|unit| !unit.is_empty());
        self
    }
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ExtractResult<Self> {
        if start > end {
            return Err(ExtractError::InvalidData(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Date-span selection shown by the page controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpanState {
    /// Label of the selected preset (`1Y`, `MAX`, ...), if any is marked.
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub custom_start: Option<NaiveDate>,
    #[serde(default)]
    pub custom_end: Option<NaiveDate>,
}

impl DateSpanState {
    #[must_use]
    pub fn custom_range(&self) -> Option<DateRange> {
        match (self.custom_start, self.custom_end) {
            (Some(start), Some(end)) if start <= end => Some(DateRange { start, end }),
            _ => None,
        }
    }
}

/// Whether the held snapshot reflects the page after the last interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    Uninitialized,
    Fresh,
    Stale { reason: String },
}

impl Freshness {
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh)
    }
}
