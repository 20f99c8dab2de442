use std::rc::Rc;

use scraper::ElementRef;
use tracing::{debug, warn};

use crate::core::axis_calibration::{AxisCalibration, pair_ticks};
use crate::core::path_geometry::{axis_extents, flat_tokens};
use crate::core::primitives::parse_metric_number;
use crate::core::tooltip_text::parse_selector;
use crate::core::types::PixelExtents;
use crate::error::{ExtractError, ExtractResult};
use crate::session::BrowserSession;

use super::{ChartSnapshot, ChartStateStore, DomSelectors, RawPixelSeries};

/// Builds the value-axis pixel-to-unit mapping from gridlines, tick labels
/// and axis-line geometry of the current snapshot.
pub struct AxisCalibrator<S: BrowserSession> {
    store: Rc<ChartStateStore<S>>,
}

impl<S: BrowserSession> AxisCalibrator<S> {
    #[must_use]
    pub fn new(store: Rc<ChartStateStore<S>>) -> Self {
        Self { store }
    }

    /// Calibrates against the store's fresh snapshot.
    pub fn calibrate_value_axis(&self) -> ExtractResult<AxisCalibration> {
        let snapshot = self.store.require_fresh()?;
        calibrate_snapshot(&snapshot, self.store.selectors())
    }

    /// Estimated (min, max) data values spanned by a trace.
    pub fn data_range(
        &self,
        trace: &RawPixelSeries,
        calibration: &AxisCalibration,
    ) -> ExtractResult<(f64, f64)> {
        if trace.revision() != calibration.revision() {
            return Err(ExtractError::StaleSnapshot(format!(
                "trace from revision {} but calibration from revision {}",
                trace.revision(),
                calibration.revision()
            )));
        }
        calibration
            .value_range(&trace.screen_ys())
            .ok_or_else(|| ExtractError::InvalidData("trace has no finite points".to_owned()))
    }
}

/// Last group matching `group` that holds at least one `item`.
fn last_populated_group<'a>(
    snapshot: &'a ChartSnapshot,
    group: &str,
    item: &str,
) -> ExtractResult<Vec<ElementRef<'a>>> {
    let item_selector = parse_selector(item)?;
    Ok(snapshot
        .select(group)?
        .into_iter()
        .map(|node| node.select(&item_selector).collect::<Vec<_>>())
        .filter(|items| !items.is_empty())
        .last()
        .unwrap_or_default())
}

fn gridline_pixels(snapshot: &ChartSnapshot, selectors: &DomSelectors) -> ExtractResult<Vec<f64>> {
    let mut pixels = Vec::new();
    for gridline in last_populated_group(snapshot, &selectors.y_grid_group, &selectors.gridline)? {
        let Some(d) = gridline.value().attr("d") else {
            continue;
        };
        match flat_tokens(d) {
            Ok(tokens) => pixels.extend(tokens.last().copied()),
            Err(err) => debug!(error = %err, "skipping unparsable gridline"),
        }
    }
    Ok(pixels)
}

fn tick_labels(
    snapshot: &ChartSnapshot,
    selectors: &DomSelectors,
) -> ExtractResult<Vec<(Option<f64>, f64)>> {
    let mut labels = Vec::new();
    for label in last_populated_group(snapshot, &selectors.y_label_group, &selectors.label)? {
        let text = label.text().collect::<String>();
        match parse_metric_number(&text) {
            Ok(value) => {
                let y = label
                    .value()
                    .attr("y")
                    .and_then(|raw| raw.trim().parse::<f64>().ok());
                labels.push((y, value));
            }
            Err(err) => debug!(label = text.trim(), error = %err, "skipping tick label"),
        }
    }
    Ok(labels)
}

fn read_extents(snapshot: &ChartSnapshot, selectors: &DomSelectors) -> Option<PixelExtents> {
    let line_d = |selector: &str| -> Option<String> {
        snapshot
            .select(selector)
            .ok()?
            .first()
            .and_then(|line| line.value().attr("d"))
            .map(str::to_owned)
    };
    let (y_line, x_line) = (line_d(&selectors.y_axis_line)?, line_d(&selectors.x_axis_line)?);
    match axis_extents(&y_line, &x_line) {
        Ok(extents) => Some(extents),
        Err(err) => {
            warn!(error = %err, "axis line geometry unusable, scaling from tick slopes");
            None
        }
    }
}

/// Calibration of `snapshot`'s value axis.
pub fn calibrate_snapshot(
    snapshot: &ChartSnapshot,
    selectors: &DomSelectors,
) -> ExtractResult<AxisCalibration> {
    let gridlines = gridline_pixels(snapshot, selectors)?;
    let labels = tick_labels(snapshot, selectors)?;
    let ticks = pair_ticks(&gridlines, &labels);
    let extents = read_extents(snapshot, selectors);

    let calibration =
        AxisCalibration::from_ticks(&ticks, extents)?.with_revision(snapshot.revision());
    let (scale, source) = calibration.scale();
    debug!(
        revision = snapshot.revision(),
        gridlines = gridlines.len(),
        labels = labels.len(),
        ticks = calibration.ticks().len(),
        pixel_to_unit = calibration.pixel_to_unit(),
        scale,
        source = ?source,
        "value axis calibrated"
    );
    Ok(calibration)
}
