use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{ExtractError, ExtractResult};

static METRIC_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d*\.?\d+)([KMBGT])?(?:\b|$)").expect("metric number pattern is valid")
});

pub fn decimal_to_f64(value: Decimal, field_name: &str) -> ExtractResult<f64> {
    value.to_f64().ok_or_else(|| {
        ExtractError::InvalidData(format!("{field_name} cannot be represented as f64"))
    })
}

fn metric_multiplier(suffix: &str) -> Decimal {
    match suffix {
        "K" => Decimal::from(1_000u64),
        "M" => Decimal::from(1_000_000u64),
        "B" | "G" => Decimal::from(1_000_000_000u64),
        "T" => Decimal::from(1_000_000_000_000u64),
        _ => Decimal::ONE,
    }
}

/// Normalizes rendered number text before matching: unicode minus, comma
/// grouping and thin/non-breaking spaces inside digits.
fn normalize_number_text(text: &str) -> String {
    text.trim()
        .replace(['\u{2212}', '\u{2013}'], "-")
        .replace([',', '\u{202f}', '\u{a0}'], "")
}

/// Splits text such as `"1.3K Points"` into `(1300.0, "Points")`.
///
/// The first numeric run (with an optional K/M/B/G/T suffix) is the value;
/// everything else, trimmed, is the unit label.
pub fn split_number_and_unit(text: &str) -> ExtractResult<(f64, String)> {
    let normalized = normalize_number_text(text);
    let captures = METRIC_NUMBER
        .captures(&normalized)
        .ok_or_else(|| ExtractError::Parse(format!("no number in `{}`", text.trim())))?;
    let whole = captures
        .get(0)
        .ok_or_else(|| ExtractError::Parse(format!("no number in `{}`", text.trim())))?;
    let digits = captures.get(1).map_or("", |m| m.as_str());
    let suffix = captures.get(2).map_or("", |m| m.as_str());

    let value = parse_decimal(digits)? * metric_multiplier(suffix);
    let unit = format!(
        "{} {}",
        &normalized[..whole.start()],
        &normalized[whole.end()..]
    );
    Ok((
        decimal_to_f64(value, "metric number")?,
        unit.split_whitespace().collect::<Vec<_>>().join(" "),
    ))
}

/// Parses a label that should contain only a number, e.g. `"1,250"`,
/// `"-2.5M"`, `"\u{2212}10"`.
pub fn parse_metric_number(text: &str) -> ExtractResult<f64> {
    let (value, rest) = split_number_and_unit(text)?;
    if rest.is_empty() || rest == "%" {
        return Ok(value);
    }
    Err(ExtractError::Parse(format!(
        "unexpected text `{rest}` around number in `{}`",
        text.trim()
    )))
}

fn parse_decimal(digits: &str) -> ExtractResult<Decimal> {
    let padded = if let Some(rest) = digits.strip_prefix("-.") {
        format!("-0.{rest}")
    } else if let Some(rest) = digits.strip_prefix('.') {
        format!("0.{rest}")
    } else {
        digits.to_owned()
    };
    Decimal::from_str(&padded)
        .or_else(|_| Decimal::from_scientific(&padded))
        .map_err(|e| ExtractError::Parse(format!("invalid number `{digits}`: {e}")))
}

/// Days since the common era; the linear time axis used for even spacing.
#[must_use]
pub fn date_to_days(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

pub fn days_to_date(days: i64) -> ExtractResult<NaiveDate> {
    i32::try_from(days)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| ExtractError::InvalidData(format!("day number {days} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::{parse_metric_number, split_number_and_unit};

    #[test]
    fn metric_suffixes_scale_the_value() {
        assert_eq!(parse_metric_number("1.3K").expect("k"), 1_300.0);
        assert_eq!(parse_metric_number("2.6M").expect("m"), 2_600_000.0);
        assert_eq!(parse_metric_number("4B").expect("b"), 4_000_000_000.0);
        assert_eq!(parse_metric_number("4G").expect("g"), 4_000_000_000.0);
        assert_eq!(parse_metric_number("1.5T").expect("t"), 1_500_000_000_000.0);
    }

    #[test]
    fn comma_grouping_and_unicode_minus_are_normalized() {
        assert_eq!(parse_metric_number("1,250").expect("grouped"), 1_250.0);
        assert_eq!(parse_metric_number("\u{2212}10").expect("minus"), -10.0);
        assert_eq!(parse_metric_number("-.5").expect("bare fraction"), -0.5);
    }

    #[test]
    fn unit_label_is_split_from_value() {
        let (value, unit) = split_number_and_unit("52.3 Points").expect("value");
        assert_eq!(value, 52.3);
        assert_eq!(unit, "Points");

        let (value, unit) = split_number_and_unit("1.2K USD Million").expect("value");
        assert_eq!(value, 1_200.0);
        assert_eq!(unit, "USD Million");
    }

    #[test]
    fn words_starting_with_suffix_letters_are_not_suffixes() {
        let (value, unit) = split_number_and_unit("7 Thousand").expect("value");
        assert_eq!(value, 7.0);
        assert_eq!(unit, "Thousand");
    }

    #[test]
    fn label_with_trailing_words_is_not_a_plain_number() {
        assert!(parse_metric_number("abc").is_err());
        assert!(parse_metric_number("12 apples").is_err());
    }
}
