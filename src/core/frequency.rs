use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, ExtractResult};

/// Sampling frequency of a rendered series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    /// Weekly, anchored on the weekday the observations fall on.
    Weekly(Weekday),
    MonthStart,
    QuarterStart,
    YearStart,
    /// Multi-year or otherwise irregular spacing.
    Irregular,
}

impl Frequency {
    /// Maps a modal gap in days onto a frequency bucket.
    #[must_use]
    pub fn from_gap_days(days: i64, weekday: Weekday) -> Self {
        match days {
            1..=3 => Self::Daily,
            4..=14 => Self::Weekly(weekday),
            15..=60 => Self::MonthStart,
            61..=120 => Self::QuarterStart,
            121..=420 => Self::YearStart,
            _ => Self::Irregular,
        }
    }

    /// Resample rule code in the conventional short form (`MS`, `W-SUN`, ...).
    #[must_use]
    pub fn code(self) -> String {
        match self {
            Self::Daily => "D".to_owned(),
            Self::Weekly(weekday) => format!("W-{}", weekday.to_string().to_ascii_uppercase()),
            Self::MonthStart => "MS".to_owned(),
            Self::QuarterStart => "QS".to_owned(),
            Self::YearStart => "AS".to_owned(),
            Self::Irregular => "irregular".to_owned(),
        }
    }

    #[must_use]
    pub fn is_calendar(self) -> bool {
        !matches!(self, Self::Irregular)
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("daily"),
            Self::Weekly(weekday) => write!(f, "weekly ({})", weekday_name(*weekday)),
            Self::MonthStart => f.write_str("month-start"),
            Self::QuarterStart => f.write_str("quarter-start"),
            Self::YearStart => f.write_str("year-start"),
            Self::Irregular => f.write_str("irregular"),
        }
    }
}

/// Outcome of frequency inference over observed dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyInference {
    pub frequency: Frequency,
    pub modal_gap_days: i64,
    pub distinct_dates: usize,
}

/// Infers sampling frequency from dates in the order they were observed.
///
/// Consecutive repeats are collapsed (the pointer can dwell on one point).
/// The observation order must be monotonic in either direction; the modal
/// gap of the chronologically sorted dates picks the bucket, ties resolving
/// to the smaller gap.
pub fn infer_frequency(observed: &[NaiveDate]) -> ExtractResult<FrequencyInference> {
    let mut dates: Vec<NaiveDate> = observed.to_vec();
    dates.dedup();
    if dates.len() < 2 {
        return Err(ExtractError::FrequencyIndeterminate(format!(
            "need at least 2 distinct dates, found {}",
            dates.len()
        )));
    }

    let ascending = dates.windows(2).all(|pair| pair[0] < pair[1]);
    let descending = dates.windows(2).all(|pair| pair[0] > pair[1]);
    if !ascending && !descending {
        return Err(ExtractError::FrequencyIndeterminate(
            "sampled dates are not monotonic".to_owned(),
        ));
    }
    if descending {
        dates.reverse();
    }

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for pair in dates.windows(2) {
        *counts.entry((pair[1] - pair[0]).num_days()).or_insert(0) += 1;
    }
    let mut modal: Option<(i64, usize)> = None;
    for (gap, count) in counts {
        if modal.is_none_or(|(_, best)| count > best) {
            modal = Some((gap, count));
        }
    }
    let (modal_gap_days, _) = modal.ok_or_else(|| {
        ExtractError::FrequencyIndeterminate("no date differences to take a mode of".to_owned())
    })?;

    let weekday = dates[dates.len() - 1].weekday();
    Ok(FrequencyInference {
        frequency: Frequency::from_gap_days(modal_gap_days, weekday),
        modal_gap_days,
        distinct_dates: dates.len(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Days, NaiveDate, Weekday};

    use super::{Frequency, infer_frequency};

    fn dates_from_deltas(start: NaiveDate, deltas: &[u64]) -> Vec<NaiveDate> {
        let mut out = vec![start];
        for delta in deltas {
            let last = out[out.len() - 1];
            out.push(last.checked_add_days(Days::new(*delta)).expect("date in range"));
        }
        out
    }

    #[test]
    fn bucket_edges_follow_gap_table() {
        assert_eq!(Frequency::from_gap_days(3, Weekday::Mon), Frequency::Daily);
        assert_eq!(Frequency::from_gap_days(4, Weekday::Mon), Frequency::Weekly(Weekday::Mon));
        assert_eq!(Frequency::from_gap_days(14, Weekday::Mon), Frequency::Weekly(Weekday::Mon));
        assert_eq!(Frequency::from_gap_days(15, Weekday::Mon), Frequency::MonthStart);
        assert_eq!(Frequency::from_gap_days(60, Weekday::Mon), Frequency::MonthStart);
        assert_eq!(Frequency::from_gap_days(61, Weekday::Mon), Frequency::QuarterStart);
        assert_eq!(Frequency::from_gap_days(120, Weekday::Mon), Frequency::QuarterStart);
        assert_eq!(Frequency::from_gap_days(121, Weekday::Mon), Frequency::YearStart);
        assert_eq!(Frequency::from_gap_days(420, Weekday::Mon), Frequency::YearStart);
        assert_eq!(Frequency::from_gap_days(421, Weekday::Mon), Frequency::Irregular);
        assert_eq!(Frequency::from_gap_days(0, Weekday::Mon), Frequency::Irregular);
    }

    #[test]
    fn ties_resolve_to_smaller_gap() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).expect("date");
        let dates = dates_from_deltas(start, &[90, 365]);
        let inference = infer_frequency(&dates).expect("inference");
        assert_eq!(inference.modal_gap_days, 90);
        assert_eq!(inference.frequency, Frequency::QuarterStart);
    }

    #[test]
    fn descending_scan_order_is_accepted() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        let mut dates = dates_from_deltas(start, &[1, 1, 1]);
        dates.reverse();
        let inference = infer_frequency(&dates).expect("inference");
        assert_eq!(inference.frequency, Frequency::Daily);
    }

    #[test]
    fn non_monotonic_dates_are_indeterminate() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        let b = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
        let c = NaiveDate::from_ymd_opt(2024, 2, 1).expect("date");
        assert!(infer_frequency(&[a, b, c]).is_err());
        assert!(infer_frequency(&[a, a]).is_err());
    }

    #[test]
    fn codes_and_display_are_stable() {
        assert_eq!(Frequency::Weekly(Weekday::Sun).code(), "W-SUN");
        assert_eq!(Frequency::Weekly(Weekday::Sun).to_string(), "weekly (Sunday)");
        assert_eq!(Frequency::MonthStart.code(), "MS");
        assert_eq!(Frequency::YearStart.to_string(), "year-start");
    }
}
