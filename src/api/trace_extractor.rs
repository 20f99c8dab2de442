use std::rc::Rc;

use scraper::ElementRef;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::chart_type::ChartType;
use crate::core::path_geometry::{anchor_points, parse_translate, sort_dedup_by_x};
use crate::core::types::PixelPoint;
use crate::error::{ExtractError, ExtractResult};
use crate::session::BrowserSession;

use super::{ChartSnapshot, ChartStateStore, DomSelectors};

/// Trace vertices with x strictly increasing and y measured upward from
/// `baseline_px`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPixelSeries {
    points: Vec<PixelPoint>,
    baseline_px: f64,
    revision: u64,
}

impl RawPixelSeries {
    /// Builds a series from screen-space points in any order.
    pub fn from_screen_points(
        screen_points: Vec<PixelPoint>,
        baseline_px: f64,
        revision: u64,
    ) -> ExtractResult<Self> {
        if !baseline_px.is_finite() {
            return Err(ExtractError::InvalidData(
                "trace baseline is not finite".to_owned(),
            ));
        }
        let points: Vec<PixelPoint> = sort_dedup_by_x(screen_points)
            .into_iter()
            .map(|point| PixelPoint::new(point.x, baseline_px - point.y))
            .collect();
        if points.is_empty() {
            return Err(ExtractError::InvalidData("trace has no points".to_owned()));
        }
        Ok(Self {
            points,
            baseline_px,
            revision,
        })
    }

    #[must_use]
    pub fn points(&self) -> &[PixelPoint] {
        &self.points
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn baseline_px(&self) -> f64 {
        self.baseline_px
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn xs(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.x).collect()
    }

    /// Inverted y values, growing upward like the value axis.
    #[must_use]
    pub fn upward_ys(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.y).collect()
    }

    /// Original screen-space y values.
    #[must_use]
    pub fn screen_ys(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|point| self.baseline_px - point.y)
            .collect()
    }
}

/// Reads the data trace of the displayed chart from path geometry.
pub struct TraceExtractor<S: BrowserSession> {
    store: Rc<ChartStateStore<S>>,
}

impl<S: BrowserSession> TraceExtractor<S> {
    #[must_use]
    pub fn new(store: Rc<ChartStateStore<S>>) -> Self {
        Self { store }
    }

    /// Trace of the store's fresh snapshot, which must show `chart_type`.
    pub fn extract_pixel_trace(&self, chart_type: ChartType) -> ExtractResult<RawPixelSeries> {
        let snapshot = self.store.require_fresh()?;
        extract_trace(&snapshot, self.store.selectors(), chart_type)
    }
}

/// Sum of `translate` transforms on the ancestors of `node`.
fn ancestor_translation(node: ElementRef<'_>) -> (f64, f64) {
    node.ancestors()
        .filter_map(ElementRef::wrap)
        .filter_map(|ancestor| ancestor.value().attr("transform"))
        .map(parse_translate)
        .fold((0.0, 0.0), |(ax, ay), (tx, ty)| (ax + tx, ay + ty))
}

fn baseline(snapshot: &ChartSnapshot, selectors: &DomSelectors, points: &[PixelPoint]) -> f64 {
    let plot_bottom = snapshot
        .select(&selectors.plot_background)
        .ok()
        .and_then(|nodes| {
            let plot = nodes.first()?.value();
            let y = plot.attr("y")?.trim().parse::<f64>().ok()?;
            let height = plot.attr("height")?.trim().parse::<f64>().ok()?;
            Some(y + height)
        });
    plot_bottom.unwrap_or_else(|| {
        warn!("plot background missing, inverting trace against its lowest point");
        points.iter().map(|point| point.y).fold(f64::NEG_INFINITY, f64::max)
    })
}

/// Trace of `snapshot` for `chart_type`.
///
/// Exactly one trace node must match; several are ambiguous and none
/// means the chart is not drawn as expected.
pub fn extract_trace(
    snapshot: &ChartSnapshot,
    selectors: &DomSelectors,
    chart_type: ChartType,
) -> ExtractResult<RawPixelSeries> {
    if snapshot.chart_type() != Some(chart_type) {
        return Err(ExtractError::StaleSnapshot(format!(
            "snapshot shows {:?}, trace requested for {chart_type}",
            snapshot.chart_type()
        )));
    }
    let selector = selectors.trace_for(chart_type).ok_or_else(|| {
        ExtractError::Unsupported(format!("{chart_type} charts draw no trace path"))
    })?;

    let nodes = snapshot.select(&selector)?;
    let node = match nodes.as_slice() {
        [] => {
            return Err(ExtractError::ElementMissing { selector });
        }
        [single] => *single,
        _ => {
            return Err(ExtractError::AmbiguousDom {
                selector,
                count: nodes.len(),
            });
        }
    };

    let d = node
        .value()
        .attr("d")
        .ok_or_else(|| ExtractError::Parse(format!("trace `{selector}` has no path data")))?;
    let (tx, ty) = ancestor_translation(node);
    let screen_points: Vec<PixelPoint> = anchor_points(d)?
        .into_iter()
        .map(|point| PixelPoint::new(point.x + tx, point.y + ty))
        .collect();
    let baseline_px = baseline(snapshot, selectors, &screen_points);

    let series = RawPixelSeries::from_screen_points(screen_points, baseline_px, snapshot.revision())?;
    debug!(
        revision = snapshot.revision(),
        points = series.len(),
        baseline_px,
        translate_x = tx,
        translate_y = ty,
        "pixel trace extracted"
    );
    Ok(series)
}
