use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::types::PixelExtents;
use crate::error::{ExtractError, ExtractResult};

/// One value-axis tick: gridline screen pixel and its label value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisTick {
    pub pixel: f64,
    pub value: f64,
}

impl AxisTick {
    #[must_use]
    pub fn new(pixel: f64, value: f64) -> Self {
        Self { pixel, value }
    }
}

/// Where the final units-per-pixel factor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleSource {
    /// Tick value span over axis-line pixel span.
    Extents,
    /// Average of consecutive tick slopes.
    TickSlopes,
}

/// Pixel-to-unit mapping of the value axis.
///
/// Ticks are kept in screen order (top of the plot first). Valid only for
/// the snapshot revision it was derived from. Deserialized calibrations are
/// rebuilt from their ticks, so the two-tick minimum holds for them too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AxisCalibrationRecord")]
pub struct AxisCalibration {
    pixel_to_unit: f64,
    pixel_extents: Option<PixelExtents>,
    ticks: Vec<AxisTick>,
    revision: u64,
}

/// Serialized form of [`AxisCalibration`]; the scale is recomputed.
#[derive(Deserialize)]
struct AxisCalibrationRecord {
    pixel_extents: Option<PixelExtents>,
    ticks: Vec<AxisTick>,
    #[serde(default)]
    revision: u64,
}

impl TryFrom<AxisCalibrationRecord> for AxisCalibration {
    type Error = ExtractError;

    fn try_from(record: AxisCalibrationRecord) -> Result<Self, Self::Error> {
        Ok(AxisCalibration::from_ticks(&record.ticks, record.pixel_extents)?
            .with_revision(record.revision))
    }
}

impl AxisCalibration {
    /// Builds a calibration from (pixel, value) ticks.
    ///
    /// `pixel_to_unit` is the mean absolute slope between consecutive ticks,
    /// which absorbs uneven spacing caused by rounded labels.
    pub fn from_ticks(
        ticks: &[AxisTick],
        pixel_extents: Option<PixelExtents>,
    ) -> ExtractResult<Self> {
        let mut by_pixel: BTreeMap<OrderedFloat<f64>, f64> = BTreeMap::new();
        for tick in ticks {
            if tick.pixel.is_finite() && tick.value.is_finite() {
                by_pixel.entry(OrderedFloat(tick.pixel)).or_insert(tick.value);
            }
        }
        let ticks: Vec<AxisTick> = by_pixel
            .into_iter()
            .map(|(pixel, value)| AxisTick::new(pixel.into_inner(), value))
            .collect();

        if ticks.len() < 2 {
            return Err(ExtractError::CalibrationInsufficient(format!(
                "need at least 2 usable axis ticks, found {}",
                ticks.len()
            )));
        }

        let slopes: Vec<f64> = ticks
            .windows(2)
            .map(|pair| ((pair[1].value - pair[0].value) / (pair[1].pixel - pair[0].pixel)).abs())
            .collect();
        let pixel_to_unit = slopes.iter().sum::<f64>() / slopes.len() as f64;
        if !pixel_to_unit.is_finite() || pixel_to_unit <= 0.0 {
            return Err(ExtractError::CalibrationInsufficient(
                "axis ticks carry no value span".to_owned(),
            ));
        }

        Ok(Self {
            pixel_to_unit,
            pixel_extents: pixel_extents.filter(|extents| extents.y_span() > 0.0),
            ticks,
            revision: 0,
        })
    }

    /// Tags the calibration with the snapshot revision it was read from.
    #[must_use]
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn pixel_to_unit(&self) -> f64 {
        self.pixel_to_unit
    }

    #[must_use]
    pub fn pixel_extents(&self) -> Option<PixelExtents> {
        self.pixel_extents
    }

    #[must_use]
    pub fn ticks(&self) -> &[AxisTick] {
        &self.ticks
    }

    /// Tick drawn highest on screen.
    #[must_use]
    pub fn top_tick(&self) -> AxisTick {
        self.ticks[0]
    }

    /// Tick drawn lowest on screen.
    #[must_use]
    pub fn bottom_tick(&self) -> AxisTick {
        self.ticks[self.ticks.len() - 1]
    }

    /// Units per pixel, preferring the axis-line span when it is available.
    #[must_use]
    pub fn scale(&self) -> (f64, ScaleSource) {
        if let Some(extents) = self.pixel_extents {
            let span = self.top_tick().value - self.bottom_tick().value;
            let scale = span / extents.y_span();
            if scale.is_finite() && scale > 0.0 {
                return (scale, ScaleSource::Extents);
            }
        }
        (self.pixel_to_unit, ScaleSource::TickSlopes)
    }

    /// Value at a screen-space y, anchored on the bottom tick.
    #[must_use]
    pub fn value_at_screen_y(&self, screen_y: f64) -> f64 {
        let bottom = self.bottom_tick();
        bottom.value + (bottom.pixel - screen_y) * self.scale().0
    }

    /// Estimated (min, max) data values for a set of screen-space y pixels.
    #[must_use]
    pub fn value_range(&self, screen_ys: &[f64]) -> Option<(f64, f64)> {
        let top = screen_ys.iter().copied().fold(f64::INFINITY, f64::min);
        let bottom = screen_ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !top.is_finite() || !bottom.is_finite() {
            return None;
        }
        Some((self.value_at_screen_y(bottom), self.value_at_screen_y(top)))
    }
}

/// Pairs gridline pixels with parsed label values.
///
/// Labels carrying their own `y` attach to the nearest gridline; otherwise
/// gridlines are taken top-down against values in descending order, since
/// value axes grow upward.
#[must_use]
pub fn pair_ticks(gridlines: &[f64], labels: &[(Option<f64>, f64)]) -> Vec<AxisTick> {
    let mut pixels: Vec<f64> = gridlines.iter().copied().filter(|p| p.is_finite()).collect();
    pixels.sort_by(f64::total_cmp);
    pixels.dedup();
    if pixels.is_empty() || labels.is_empty() {
        return Vec::new();
    }

    if labels.iter().all(|(y, _)| y.is_some()) {
        return labels
            .iter()
            .filter_map(|(y, value)| {
                let y = (*y)?;
                pixels
                    .iter()
                    .copied()
                    .min_by(|lhs, rhs| (lhs - y).abs().total_cmp(&(rhs - y).abs()))
                    .map(|pixel| AxisTick::new(pixel, *value))
            })
            .collect();
    }

    let mut values: Vec<f64> = labels.iter().map(|(_, value)| *value).collect();
    values.sort_by(|lhs, rhs| rhs.total_cmp(lhs));
    pixels
        .into_iter()
        .zip(values)
        .map(|(pixel, value)| AxisTick::new(pixel, value))
        .collect()
}
