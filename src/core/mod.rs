pub mod axis_calibration;
pub mod chart_type;
pub mod frequency;
pub mod path_geometry;
pub mod primitives;
pub mod reconcile;
pub mod time_index;
pub mod tooltip_text;
pub mod types;

pub use axis_calibration::{AxisCalibration, AxisTick, ScaleSource, pair_ticks};
pub use chart_type::ChartType;
pub use frequency::{Frequency, FrequencyInference, infer_frequency};
pub use reconcile::{ScalePlan, find_zero_crossing, plan_scale};
pub use time_index::{Alignment, TimeIndex};
pub use tooltip_text::TooltipReading;
pub use types::{
    DateRange, DateSpanState, EndpointPair, Freshness, PixelExtents, PixelPoint, PixelRect,
    TooltipSample,
};
