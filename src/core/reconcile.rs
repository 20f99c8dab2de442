use serde::{Deserialize, Serialize};

use crate::core::axis_calibration::{AxisCalibration, ScaleSource};
use crate::error::{ExtractError, ExtractResult};

/// Linear pixel-to-value mapping chosen for one reconciliation.
///
/// Pixels are in the upward (inverted) space of the raw trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalePlan {
    pub pix0: f64,
    pub reference_value: f64,
    pub scale: f64,
    pub source: ScaleSource,
    pub zero_crossing: bool,
}

impl ScalePlan {
    #[must_use]
    pub fn value_at(&self, upward_px: f64) -> f64 {
        (upward_px - self.pix0) * self.scale + self.reference_value
    }
}

/// Interpolated pixel where `values` changes sign.
///
/// Only series holding both strictly negative and strictly positive values
/// qualify. The first bracketing pair in drawing order is used.
#[must_use]
pub fn find_zero_crossing(pixels: &[f64], values: &[f64]) -> Option<f64> {
    let has_negative = values.iter().any(|value| *value < 0.0);
    let has_positive = values.iter().any(|value| *value > 0.0);
    if !has_negative || !has_positive {
        return None;
    }

    for i in 0..pixels.len().min(values.len()) {
        if values[i] == 0.0 {
            return Some(pixels[i]);
        }
        if i + 1 < pixels.len().min(values.len()) && values[i] * values[i + 1] < 0.0 {
            let (p0, p1) = (pixels[i], pixels[i + 1]);
            let (v0, v1) = (values[i], values[i + 1]);
            return Some(p0 + (0.0 - v0) * (p1 - p0) / (v1 - v0));
        }
    }
    None
}

/// Picks `pix0`, reference value and scale for a trace.
///
/// The zero-crossing search runs on the tick-calibrated values of the trace;
/// without a crossing the first trace pixel anchors on `y0`.
pub fn plan_scale(
    upward: &[f64],
    baseline_px: f64,
    calibration: &AxisCalibration,
    y0: f64,
) -> ExtractResult<ScalePlan> {
    let first = *upward
        .first()
        .ok_or_else(|| ExtractError::InvalidData("trace has no points".to_owned()))?;
    let (scale, source) = calibration.scale();

    let calibrated: Vec<f64> = upward
        .iter()
        .map(|px| calibration.value_at_screen_y(baseline_px - px))
        .collect();
    let plan = match find_zero_crossing(upward, &calibrated) {
        Some(pix0) => ScalePlan {
            pix0,
            reference_value: 0.0,
            scale,
            source,
            zero_crossing: true,
        },
        None => ScalePlan {
            pix0: first,
            reference_value: y0,
            scale,
            source,
            zero_crossing: false,
        },
    };
    if !plan.pix0.is_finite() || !plan.scale.is_finite() {
        return Err(ExtractError::CalibrationInsufficient(
            "scale or origin is not finite".to_owned(),
        ));
    }
    Ok(plan)
}
