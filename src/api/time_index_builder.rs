use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::core::frequency::{Frequency, infer_frequency};
use crate::core::time_index::TimeIndex;
use crate::core::types::TooltipSample;
use crate::error::{ExtractError, ExtractResult};

/// Turns endpoint dates and a handful of scanned samples into a calendar
/// index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeIndexBuilder {
    fallback: Frequency,
}

impl Default for TimeIndexBuilder {
    fn default() -> Self {
        Self {
            fallback: Frequency::MonthStart,
        }
    }
}

impl TimeIndexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Frequency assumed when the samples cannot decide one.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Frequency) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn fallback(&self) -> Frequency {
        self.fallback
    }

    /// Frequency of `recent` in scan order, or the fallback flagged as
    /// degraded.
    #[must_use]
    pub fn infer(&self, recent: &[TooltipSample]) -> (Frequency, bool) {
        let dates: Vec<NaiveDate> = recent.iter().map(|sample| sample.date).collect();
        match infer_frequency(&dates) {
            Ok(inference) => {
                debug!(
                    frequency = %inference.frequency,
                    modal_gap_days = inference.modal_gap_days,
                    distinct_dates = inference.distinct_dates,
                    "sampling frequency inferred"
                );
                (inference.frequency, false)
            }
            Err(err @ ExtractError::FrequencyIndeterminate(_)) => {
                warn!(
                    error = %err,
                    fallback = %self.fallback,
                    "frequency indeterminate, assuming fallback spacing"
                );
                (self.fallback, true)
            }
            Err(err) => {
                warn!(error = %err, fallback = %self.fallback, "frequency inference failed");
                (self.fallback, true)
            }
        }
    }

    /// Index from `start` to `end` at the frequency inferred from `recent`.
    ///
    /// Irregular series have no calendar: with a `point_hint` (raw trace
    /// length) the index is evenly spaced over the span, otherwise it is
    /// the observed dates themselves.
    pub fn build_index(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        recent: &[TooltipSample],
        point_hint: Option<usize>,
    ) -> ExtractResult<TimeIndex> {
        if start > end {
            return Err(ExtractError::InvalidData(format!(
                "index start {start} is after end {end}"
            )));
        }
        let (frequency, degraded) = self.infer(recent);

        let index = if frequency.is_calendar() {
            TimeIndex::calendar(start, end, frequency)?
        } else if let Some(count) = point_hint.filter(|count| *count >= 2) {
            TimeIndex::evenly_spaced(start, end, count, frequency)?
        } else {
            let observed = std::iter::once(start)
                .chain(recent.iter().map(|sample| sample.date))
                .chain(std::iter::once(end))
                .filter(|date| *date >= start && *date <= end)
                .collect();
            TimeIndex::from_observed(observed, frequency)?
        };
        let index = index.degraded(degraded);

        debug!(
            start = %index.first(),
            end = %index.last(),
            len = index.len(),
            frequency = %index.frequency(),
            degraded,
            "time index built"
        );
        Ok(index)
    }
}
