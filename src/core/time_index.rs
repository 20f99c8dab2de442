use chrono::{Datelike, Days, Months, NaiveDate};
use serde::Serialize;

use crate::core::frequency::Frequency;
use crate::core::primitives::{date_to_days, days_to_date};
use crate::error::{ExtractError, ExtractResult};

/// Ordered, strictly increasing calendar index with its frequency tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeIndex {
    dates: Vec<NaiveDate>,
    frequency: Frequency,
    degraded: bool,
}

/// Values laid onto an index.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub values: Vec<f64>,
    /// Index slots that received no observation and were interpolated.
    pub filled_points: usize,
}

impl Alignment {
    /// Share of index slots that were interpolated.
    #[must_use]
    pub fn filled_fraction(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.filled_points as f64 / self.values.len() as f64
    }

    /// Fails with `IncompleteCoverage` when more than `max_filled_fraction`
    /// of the slots had to be interpolated.
    pub fn ensure_coverage(&self, max_filled_fraction: f64) -> ExtractResult<()> {
        let filled = self.filled_fraction();
        if filled > max_filled_fraction {
            return Err(ExtractError::IncompleteCoverage(format!(
                "{} of {} index dates had no observation ({:.0}% > {:.0}%)",
                self.filled_points,
                self.values.len(),
                filled * 100.0,
                max_filled_fraction * 100.0
            )));
        }
        Ok(())
    }
}

/// First date of the period `date` falls in, as resampling labels it.
///
/// Weekly periods are labelled by their anchor weekday on or after `date`.
#[must_use]
pub fn period_label(frequency: Frequency, date: NaiveDate) -> NaiveDate {
    match frequency {
        Frequency::Daily | Frequency::Irregular => date,
        Frequency::Weekly(anchor) => {
            let ahead = (7 + anchor.num_days_from_monday() - date.weekday().num_days_from_monday())
                % 7;
            date.checked_add_days(Days::new(u64::from(ahead)))
                .unwrap_or(date)
        }
        Frequency::MonthStart => date.with_day(1).unwrap_or(date),
        Frequency::QuarterStart => {
            let month = ((date.month() - 1) / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
        }
        Frequency::YearStart => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

/// Start of the period following the one labelled `date`.
#[must_use]
pub fn step_period(frequency: Frequency, date: NaiveDate) -> Option<NaiveDate> {
    match frequency {
        Frequency::Daily | Frequency::Irregular => date.checked_add_days(Days::new(1)),
        Frequency::Weekly(_) => date.checked_add_days(Days::new(7)),
        Frequency::MonthStart => date.checked_add_months(Months::new(1)),
        Frequency::QuarterStart => date.checked_add_months(Months::new(3)),
        Frequency::YearStart => date.checked_add_months(Months::new(12)),
    }
}

impl TimeIndex {
    /// Wraps dates that must already be strictly increasing.
    pub fn new(dates: Vec<NaiveDate>, frequency: Frequency) -> ExtractResult<Self> {
        if dates.is_empty() {
            return Err(ExtractError::InvalidData("time index is empty".to_owned()));
        }
        if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(ExtractError::InvalidData(format!(
                "time index is not strictly increasing at {} -> {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self {
            dates,
            frequency,
            degraded: false,
        })
    }

    /// Calendar sequence covering the periods of `start` through `end`.
    pub fn calendar(start: NaiveDate, end: NaiveDate, frequency: Frequency) -> ExtractResult<Self> {
        if start > end {
            return Err(ExtractError::InvalidData(format!(
                "index start {start} is after end {end}"
            )));
        }
        if !frequency.is_calendar() {
            return Err(ExtractError::InvalidData(
                "irregular frequency has no calendar".to_owned(),
            ));
        }
        let last = period_label(frequency, end);
        let mut current = period_label(frequency, start);
        let mut dates = Vec::new();
        while current <= last {
            dates.push(current);
            current = match step_period(frequency, current) {
                Some(next) => next,
                None => break,
            };
        }
        Self::new(dates, frequency)
    }

    /// `count` day-rounded dates evenly spread from `start` to `end`.
    ///
    /// Rounding can collide on short spans; collisions are dropped, so the
    /// result may be shorter than `count`.
    pub fn evenly_spaced(
        start: NaiveDate,
        end: NaiveDate,
        count: usize,
        frequency: Frequency,
    ) -> ExtractResult<Self> {
        if start > end {
            return Err(ExtractError::InvalidData(format!(
                "index start {start} is after end {end}"
            )));
        }
        let mut dates = even_days(date_to_days(start), date_to_days(end), count.max(1))
            .into_iter()
            .map(|day| days_to_date(day.round() as i64))
            .collect::<ExtractResult<Vec<_>>>()?;
        dates.dedup();
        Self::new(dates, frequency)
    }

    /// Index over dates read from the page, in any order.
    pub fn from_observed(mut dates: Vec<NaiveDate>, frequency: Frequency) -> ExtractResult<Self> {
        dates.sort_unstable();
        dates.dedup();
        Self::new(dates, frequency)
    }

    #[must_use]
    pub fn degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }

    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    #[must_use]
    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Whether the frequency was assumed rather than inferred.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> NaiveDate {
        self.dates[0]
    }

    #[must_use]
    pub fn last(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Position of the index date closest to `day`; earlier date on ties.
    #[must_use]
    pub fn nearest_position(&self, day: f64) -> usize {
        let upper = self
            .dates
            .partition_point(|date| (date_to_days(*date) as f64) < day);
        if upper == 0 {
            return 0;
        }
        if upper >= self.dates.len() {
            return self.dates.len() - 1;
        }
        let below = day - date_to_days(self.dates[upper - 1]) as f64;
        let above = date_to_days(self.dates[upper]) as f64 - day;
        if above < below { upper } else { upper - 1 }
    }

    /// Lays `values` onto the index.
    ///
    /// Equal lengths zip directly. Otherwise each value gets an evenly
    /// spaced timestamp across the index span, snaps to its nearest index
    /// date, and the first value per date wins; dates left without a value
    /// are linearly interpolated from their neighbours.
    pub fn align(&self, values: &[f64]) -> ExtractResult<Alignment> {
        if values.is_empty() {
            return Err(ExtractError::InvalidData(
                "no values to align onto the index".to_owned(),
            ));
        }
        if values.len() == self.dates.len() {
            return Ok(Alignment {
                values: values.to_vec(),
                filled_points: 0,
            });
        }

        let mut buckets: Vec<Option<f64>> = vec![None; self.dates.len()];
        let stamps = even_days(
            date_to_days(self.first()),
            date_to_days(self.last()),
            values.len(),
        );
        for (stamp, value) in stamps.into_iter().zip(values.iter().copied()) {
            let slot = &mut buckets[self.nearest_position(stamp)];
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        self.fill_sparse(&buckets)
    }

    /// Completes one optional value per index date by interpolation.
    pub fn fill_sparse(&self, slots: &[Option<f64>]) -> ExtractResult<Alignment> {
        if slots.len() != self.dates.len() {
            return Err(ExtractError::InvalidData(format!(
                "{} slots for an index of {} dates",
                slots.len(),
                self.dates.len()
            )));
        }
        if slots.iter().all(Option::is_none) {
            return Err(ExtractError::InvalidData(
                "no index date received a value".to_owned(),
            ));
        }
        let filled_points = slots.iter().filter(|slot| slot.is_none()).count();
        let days: Vec<f64> = self
            .dates
            .iter()
            .map(|date| date_to_days(*date) as f64)
            .collect();
        Ok(Alignment {
            values: interpolate_gaps(slots, &days),
            filled_points,
        })
    }
}

fn even_days(start: i64, end: i64, count: usize) -> Vec<f64> {
    if count <= 1 {
        return vec![start as f64];
    }
    let step = (end - start) as f64 / (count - 1) as f64;
    (0..count).map(|i| start as f64 + step * i as f64).collect()
}

/// Fills `None` slots linearly in `positions`; edges take the nearest value.
fn interpolate_gaps(slots: &[Option<f64>], positions: &[f64]) -> Vec<f64> {
    let known: Vec<usize> = (0..slots.len()).filter(|i| slots[*i].is_some()).collect();
    slots
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            if let Some(value) = slot {
                return *value;
            }
            let next = known.partition_point(|k| *k < i);
            match (next.checked_sub(1).map(|p| known[p]), known.get(next)) {
                (Some(lo), Some(&hi)) => {
                    let (lo_value, hi_value) =
                        (slots[lo].unwrap_or_default(), slots[hi].unwrap_or_default());
                    let t = (positions[i] - positions[lo]) / (positions[hi] - positions[lo]);
                    lo_value + (hi_value - lo_value) * t
                }
                (Some(lo), None) => slots[lo].unwrap_or_default(),
                (None, Some(&hi)) => slots[hi].unwrap_or_default(),
                (None, None) => f64::NAN,
            }
        })
        .collect()
}
