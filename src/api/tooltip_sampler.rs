use std::rc::Rc;

use tracing::{debug, warn};

use crate::core::chart_type::ChartType;
use crate::core::tooltip_text::{
    TooltipReading, parse_tooltip_date, parse_tooltip_html, parse_tooltip_value,
};
use crate::core::types::{EndpointPair, PixelRect, TooltipSample};
use crate::error::{ExtractError, ExtractResult};
use crate::session::{BrowserSession, ScanRequest, build_scan_script, parse_scan_outcome};

use super::ChartStateStore;

/// Horizontal pointer walk over the plot.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Walk {
    start_x: f64,
    end_x: f64,
    y: f64,
    max_points: Option<usize>,
    step_budget: usize,
}

/// Reads hover tooltips by driving the pointer across the plot.
pub struct TooltipSampler<S: BrowserSession> {
    store: Rc<ChartStateStore<S>>,
}

impl<S: BrowserSession> TooltipSampler<S> {
    #[must_use]
    pub fn new(store: Rc<ChartStateStore<S>>) -> Self {
        Self { store }
    }

    /// Plot rectangle in viewport coordinates.
    pub fn plot_rect(&self) -> ExtractResult<PixelRect> {
        let selector = self.store.selectors().plot_background.clone();
        let rect = self
            .store
            .retry_interaction(&selector, |session| session.element_rect(&selector))?;
        if !rect.is_valid() {
            return Err(ExtractError::InvalidData(format!(
                "plot rectangle {rect:?} is degenerate"
            )));
        }
        Ok(rect)
    }

    /// Moves the pointer and parses whatever tooltip is shown.
    pub fn read_tooltip_at(&self, x: f64, y: f64) -> ExtractResult<Option<TooltipReading>> {
        let selectors = self.store.selectors();
        let settle = self.store.config().timeouts.hover_settle();
        let html = self.store.with_session(|session| {
            session.move_pointer(x, y)?;
            session.pause(settle);
            session.outer_html(&selectors.tooltip)
        })?;
        match html {
            Some(html) => {
                parse_tooltip_html(&html, &selectors.tooltip_date, &selectors.tooltip_value)
            }
            None => Ok(None),
        }
    }

    /// Tooltip at `(x, y)`, retried while the tooltip is still empty.
    pub fn sample_at(&self, x: f64, y: f64) -> ExtractResult<(TooltipSample, String)> {
        let label = format!("tooltip at ({x:.1}, {y:.1})");
        let reading = self.store.config().retry.run(
            &label,
            |_| {
                self.read_tooltip_at(x, y)?
                    .ok_or(ExtractError::TooltipEmpty { x, y })
            },
            |delay| self.store.with_session(|session| session.pause(delay)),
        )?;
        Ok((
            TooltipSample {
                date: reading.date,
                value: reading.value,
                pixel_x: x,
                pixel_y: y,
            },
            reading.unit,
        ))
    }

    /// Start and end observations read just inside the plot edges at
    /// mid-height. Forces a line chart first, since tooltip geometry at
    /// the edges is only reliable there.
    pub fn first_last_dates(&self) -> ExtractResult<EndpointPair> {
        let snapshot = match self.store.require_fresh() {
            Ok(snapshot) => snapshot,
            Err(_) => self.store.update_chart()?,
        };
        if !snapshot
            .chart_type()
            .is_some_and(ChartType::supports_tooltip_geometry)
        {
            self.store.force_chart_type(ChartType::Line)?;
        }

        let rect = self.plot_rect()?;
        let inset = self.store.config().sampler.edge_offset_px;
        let y = rect.center_y();
        let (start, unit) = self.sample_at(rect.left() + inset, y)?;
        let (end, _) = self.sample_at(rect.right() - inset, y)?;
        debug!(
            start = %start.date,
            end = %end.date,
            start_value = start.value,
            end_value = end.value,
            unit = unit.as_str(),
            "series endpoints sampled"
        );
        Ok(EndpointPair::new(start, end)?.with_unit(Some(unit)))
    }

    /// Up to `n` distinct points scanning right from the plot centre.
    pub fn sample_recent_points(&self, n: usize) -> ExtractResult<Vec<TooltipSample>> {
        let rect = self.plot_rect()?;
        let inset = self.store.config().sampler.edge_offset_px;
        let walk = Walk {
            start_x: rect.center_x(),
            end_x: rect.right() - inset,
            y: rect.center_y(),
            max_points: Some(n),
            step_budget: self.store.config().sampler.step_budget,
        };
        self.scan(rect, walk)
    }

    /// Every distinguishable point from the left plot edge to the right.
    pub fn scan_all_points(&self) -> ExtractResult<Vec<TooltipSample>> {
        let rect = self.plot_rect()?;
        let tuning = self.store.config().sampler;
        let full_width = (rect.width / tuning.scan_step_px).ceil() as usize + 1;
        let walk = Walk {
            start_x: rect.left() + tuning.edge_offset_px,
            end_x: rect.right() - tuning.edge_offset_px,
            y: rect.center_y(),
            max_points: None,
            step_budget: tuning.step_budget.max(full_width),
        };
        self.scan(rect, walk)
    }

    fn scan(&self, rect: PixelRect, walk: Walk) -> ExtractResult<Vec<TooltipSample>> {
        if self.store.config().sampler.prefer_scripted {
            match self.scripted_scan(rect, walk) {
                Ok(samples) => return Ok(samples),
                Err(err) if err.is_session_fatal() => return Err(err),
                Err(err) => warn!(error = %err, "scripted scan unavailable, stepping pointer"),
            }
        }
        self.stepped_scan(walk)
    }

    fn scripted_scan(&self, rect: PixelRect, walk: Walk) -> ExtractResult<Vec<TooltipSample>> {
        let config = self.store.config();
        let request = ScanRequest {
            chart_selector: config.selectors.chart_root.clone(),
            tooltip_selector: config.selectors.tooltip.clone(),
            date_selector: config.selectors.tooltip_date.clone(),
            value_selector: config.selectors.tooltip_value.clone(),
            plot: rect,
            start_x: walk.start_x,
            end_x: walk.end_x,
            step_px: config.sampler.scan_step_px,
            y: walk.y,
            max_points: walk.max_points,
            settle_ms: config.timeouts.hover_settle_ms,
        };
        let script = build_scan_script(&request)?;
        let outcome = parse_scan_outcome(
            self.store
                .with_session(|session| session.execute_script(&script))?,
        )?;
        for line in &outcome.logs {
            debug!(log = line.as_str(), "scan script");
        }

        let mut samples = Vec::with_capacity(outcome.data_points.len());
        for point in outcome.data_points {
            let date = parse_tooltip_date(&point.date)?;
            let (value, _) = parse_tooltip_value(&point.value)?;
            samples.push(TooltipSample {
                date,
                value,
                pixel_x: point.x,
                pixel_y: point.y,
            });
        }
        debug!(points = samples.len(), "scripted tooltip scan finished");
        Ok(samples)
    }

    /// Pointer walk one call per position. Once `calibration_changes` date
    /// boundaries have been crossed at the base step, the step grows to
    /// the spacing measured between them. The walk's end is always probed,
    /// so a grown step cannot skip the last point.
    fn stepped_scan(&self, walk: Walk) -> ExtractResult<Vec<TooltipSample>> {
        let tuning = self.store.config().sampler;
        let mut samples: Vec<TooltipSample> = Vec::new();
        let mut boundary_xs: Vec<f64> = Vec::new();
        let mut step = tuning.scan_step_px;
        let mut x = walk.start_x;
        let mut last_probed = None;
        let mut steps = 0;

        while x <= walk.end_x && steps < walk.step_budget {
            if walk.max_points.is_some_and(|max| samples.len() >= max) {
                break;
            }
            steps += 1;
            last_probed = Some(x);
            if self.probe(x, walk.y, &mut samples)? {
                boundary_xs.push(x);
                if boundary_xs.len() == tuning.calibration_changes.max(2) {
                    step = adaptive_step(&boundary_xs, tuning.scan_step_px);
                    debug!(step, "adaptive scan step calibrated");
                }
            }
            x += step;
        }

        let walked_past_end = x > walk.end_x && last_probed.is_some_and(|last| last < walk.end_x);
        let room_left = !walk.max_points.is_some_and(|max| samples.len() >= max);
        if walked_past_end && room_left {
            steps += 1;
            self.probe(walk.end_x, walk.y, &mut samples)?;
        }

        if steps >= walk.step_budget {
            warn!(steps, points = samples.len(), "tooltip scan hit its step budget");
        }
        debug!(steps, points = samples.len(), "stepped tooltip scan finished");
        Ok(samples)
    }

    /// Reads the tooltip at `x` and records it when its date is new.
    /// Returns whether a date boundary was crossed since the last sample.
    fn probe(&self, x: f64, y: f64, samples: &mut Vec<TooltipSample>) -> ExtractResult<bool> {
        let Some(reading) = self.read_tooltip_at(x, y)? else {
            return Ok(false);
        };
        let previous = samples.last().map(|last| last.date);
        if previous == Some(reading.date) {
            return Ok(false);
        }
        samples.push(TooltipSample {
            date: reading.date,
            value: reading.value,
            pixel_x: x,
            pixel_y: y,
        });
        Ok(previous.is_some())
    }
}

/// Half the mean distance between date boundaries, floored, at least
/// `min_step`. No point is stepped over while neighbouring gaps stay within
/// a factor of two of each other.
fn adaptive_step(boundary_xs: &[f64], min_step: f64) -> f64 {
    if boundary_xs.len() < 2 {
        return min_step;
    }
    let span = boundary_xs[boundary_xs.len() - 1] - boundary_xs[0];
    let mean = span / (boundary_xs.len() - 1) as f64;
    (mean / 2.0).floor().max(min_step)
}
