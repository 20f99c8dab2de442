use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::frequency::Frequency;
use crate::core::time_index::TimeIndex;
use crate::core::types::TooltipSample;
use crate::error::{ExtractError, ExtractResult};

pub const EXTRACTION_RESULT_JSON_SCHEMA_V1: u32 = 1;

/// Extraction strategy chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Trace path geometry scaled by axis calibration.
    TraceGeometry,
    /// Tooltip text for every distinguishable point.
    TooltipSampling,
    /// Calendar index from the trace strategy, values from windowed tooltip
    /// scans.
    Mixed,
}

impl Strategy {
    pub const ALL: [Self; 3] = [Self::TraceGeometry, Self::TooltipSampling, Self::Mixed];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TraceGeometry => "trace-geometry",
            Self::TooltipSampling => "tooltip-sampling",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ExtractError::Parse(format!("unknown strategy `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Calibrated (date, value) series; dates strictly increasing, values
/// finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedSeries {
    points: Vec<SeriesPoint>,
    frequency: Frequency,
}

impl ReconstructedSeries {
    pub fn new(points: Vec<SeriesPoint>, frequency: Frequency) -> ExtractResult<Self> {
        let series = Self { points, frequency };
        series.validate()?;
        Ok(series)
    }

    /// Pairs `values` with the dates of `index`, one to one.
    pub fn from_index(index: &TimeIndex, values: &[f64]) -> ExtractResult<Self> {
        if index.len() != values.len() {
            return Err(ExtractError::InvalidData(format!(
                "{} values for an index of {} dates",
                values.len(),
                index.len()
            )));
        }
        let points = index
            .dates()
            .iter()
            .zip(values)
            .map(|(date, value)| SeriesPoint {
                date: *date,
                value: *value,
            })
            .collect();
        Self::new(points, index.frequency())
    }

    /// Series read straight off tooltips; first sample per date wins.
    pub fn from_samples(samples: &[TooltipSample], frequency: Frequency) -> ExtractResult<Self> {
        let mut points: Vec<SeriesPoint> = samples
            .iter()
            .map(|sample| SeriesPoint {
                date: sample.date,
                value: sample.value,
            })
            .collect();
        points.sort_by_key(|point| point.date);
        points.dedup_by_key(|point| point.date);
        Self::new(points, frequency)
    }

    pub fn validate(&self) -> ExtractResult<()> {
        if self.points.is_empty() {
            return Err(ExtractError::InvalidData("series is empty".to_owned()));
        }
        if let Some(pair) = self.points.windows(2).find(|pair| pair[0].date >= pair[1].date) {
            return Err(ExtractError::InvalidData(format!(
                "series dates not strictly increasing at {} -> {}",
                pair[0].date, pair[1].date
            )));
        }
        if let Some(point) = self.points.iter().find(|point| !point.value.is_finite()) {
            return Err(ExtractError::InvalidData(format!(
                "series value on {} is not finite",
                point.date
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    #[must_use]
    pub fn frequency(&self) -> Frequency {
        self.frequency
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
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|point| point.date).collect()
    }

    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.value).collect()
    }

    #[must_use]
    pub fn first(&self) -> Option<SeriesPoint> {
        self.points.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<SeriesPoint> {
        self.points.last().copied()
    }

    #[must_use]
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |point| point.date)
            .ok()
            .map(|i| self.points[i].value)
    }

    #[must_use]
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?.value;
        Some(self.points.iter().fold((first, first), |(lo, hi), point| {
            (lo.min(point.value), hi.max(point.value))
        }))
    }
}

/// Successful extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub strategy: Strategy,
    pub series: ReconstructedSeries,
    /// Ordered key/value record describing the series.
    #[serde(default)]
    pub metadata: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResultJsonContractV1 {
    pub schema_version: u32,
    pub result: ExtractionResult,
}

impl ExtractionResult {
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn to_json_pretty(&self) -> ExtractResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            ExtractError::InvalidData(format!("failed to serialize extraction result: {e}"))
        })
    }

    pub fn to_json_contract_v1_pretty(&self) -> ExtractResult<String> {
        let payload = ExtractionResultJsonContractV1 {
            schema_version: EXTRACTION_RESULT_JSON_SCHEMA_V1,
            result: self.clone(),
        };
        serde_json::to_string_pretty(&payload).map_err(|e| {
            ExtractError::InvalidData(format!(
                "failed to serialize extraction result contract v1: {e}"
            ))
        })
    }

    /// Accepts both the bare result and the versioned envelope.
    pub fn from_json_compat_str(input: &str) -> ExtractResult<Self> {
        let result = match serde_json::from_str::<ExtractionResult>(input) {
            Ok(result) => result,
            Err(_) => {
                let payload: ExtractionResultJsonContractV1 = serde_json::from_str(input)
                    .map_err(|e| {
                        ExtractError::InvalidData(format!(
                            "failed to parse extraction result json payload: {e}"
                        ))
                    })?;
                if payload.schema_version != EXTRACTION_RESULT_JSON_SCHEMA_V1 {
                    return Err(ExtractError::InvalidData(format!(
                        "unsupported extraction result schema version: {}",
                        payload.schema_version
                    )));
                }
                payload.result
            }
        };
        result.series.validate()?;
        Ok(result)
    }
}

/// Agreement of two series on their shared dates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesComparison {
    pub shared_dates: usize,
    pub disagreeing: usize,
    pub max_relative_deviation: f64,
    pub rel_tol: f64,
}

impl SeriesComparison {
    #[must_use]
    pub fn agrees(&self) -> bool {
        self.disagreeing == 0
    }
}

fn relative_deviation(lhs: f64, rhs: f64) -> f64 {
    let magnitude = lhs.abs().max(rhs.abs());
    if magnitude == 0.0 {
        0.0
    } else {
        (lhs - rhs).abs() / magnitude
    }
}

/// Cross-checks two extractions of the same chart.
///
/// Only dates present in both series count. Disagreement beyond `rel_tol`
/// is logged, never raised.
#[must_use]
pub fn compare_series(
    lhs: &ReconstructedSeries,
    rhs: &ReconstructedSeries,
    rel_tol: f64,
) -> SeriesComparison {
    let mut comparison = SeriesComparison {
        shared_dates: 0,
        disagreeing: 0,
        max_relative_deviation: 0.0,
        rel_tol,
    };
    for point in lhs.points() {
        let Some(other) = rhs.value_on(point.date) else {
            continue;
        };
        comparison.shared_dates += 1;
        let deviation = relative_deviation(point.value, other);
        comparison.max_relative_deviation = comparison.max_relative_deviation.max(deviation);
        if deviation > rel_tol {
            comparison.disagreeing += 1;
        }
    }

    if comparison.agrees() {
        debug!(
            shared_dates = comparison.shared_dates,
            max_relative_deviation = comparison.max_relative_deviation,
            "series agree"
        );
    } else {
        warn!(
            shared_dates = comparison.shared_dates,
            disagreeing = comparison.disagreeing,
            max_relative_deviation = comparison.max_relative_deviation,
            rel_tol,
            "series disagree beyond tolerance"
        );
    }
    comparison
}
