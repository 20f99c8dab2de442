use tracing::{debug, warn};

use crate::core::axis_calibration::AxisCalibration;
use crate::core::reconcile::{ScalePlan, plan_scale};
use crate::core::time_index::TimeIndex;
use crate::core::types::EndpointPair;
use crate::error::{ExtractError, ExtractResult};

use super::{RawPixelSeries, ReconstructedSeries};

/// Reconstructed series with the scaling it was produced under.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub series: ReconstructedSeries,
    pub plan: ScalePlan,
    /// Index dates with no trace point of their own.
    pub filled_points: usize,
}

const DEFAULT_MAX_FILLED_FRACTION: f64 = 0.5;

/// Maps a pixel trace onto calibrated values over a time index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesReconciler {
    max_filled_fraction: f64,
}

impl Default for SeriesReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_filled_fraction: DEFAULT_MAX_FILLED_FRACTION,
        }
    }

    /// Largest share of index dates that may be interpolated.
    #[must_use]
    pub fn with_max_filled_fraction(mut self, fraction: f64) -> Self {
        self.max_filled_fraction = fraction;
        self
    }

    /// Values for every point of `trace`, in trace order.
    pub fn scale_trace(
        &self,
        trace: &RawPixelSeries,
        calibration: &AxisCalibration,
        endpoints: &EndpointPair,
    ) -> ExtractResult<(Vec<f64>, ScalePlan)> {
        if trace.revision() != calibration.revision() {
            return Err(ExtractError::StaleSnapshot(format!(
                "trace from revision {} but calibration from revision {}",
                trace.revision(),
                calibration.revision()
            )));
        }
        let upward = trace.upward_ys();
        let plan = plan_scale(&upward, trace.baseline_px(), calibration, endpoints.start.value)?;
        let values: Vec<f64> = upward.iter().map(|px| plan.value_at(*px)).collect();
        if values.iter().any(|value| !value.is_finite()) {
            return Err(ExtractError::InvalidData(
                "scaled trace holds non-finite values".to_owned(),
            ));
        }
        debug!(
            pix0 = plan.pix0,
            reference_value = plan.reference_value,
            scale = plan.scale,
            source = ?plan.source,
            zero_crossing = plan.zero_crossing,
            "trace scale planned"
        );
        Ok((values, plan))
    }

    pub fn reconcile(
        &self,
        trace: &RawPixelSeries,
        calibration: &AxisCalibration,
        index: &TimeIndex,
        endpoints: &EndpointPair,
    ) -> ExtractResult<Reconciliation> {
        let (values, plan) = self.scale_trace(trace, calibration, endpoints)?;
        let alignment = index.align(&values)?;
        alignment.ensure_coverage(self.max_filled_fraction)?;
        if alignment.filled_points > 0 {
            warn!(
                filled_points = alignment.filled_points,
                trace_points = values.len(),
                index_len = index.len(),
                "index dates without trace points were interpolated"
            );
        }
        let series = ReconstructedSeries::from_index(index, &alignment.values)?;
        Ok(Reconciliation {
            series,
            plan,
            filled_points: alignment.filled_points,
        })
    }
}
