use chrono::{Datelike, NaiveDate};
use scraper::{Html, Selector};

use crate::core::primitives::split_number_and_unit;
use crate::error::{ExtractError, ExtractResult};

/// Quarter tokens map to the first month of the quarter (quarter-start
/// convention).
const QUARTER_MONTHS: [(&str, &str); 4] = [
    ("Q1", "January"),
    ("Q2", "April"),
    ("Q3", "July"),
    ("Q4", "October"),
];

const MONTH_FORMATS: [&str; 2] = ["%d %B %Y", "%d %b %Y"];

const DAY_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%b %d %Y",
    "%b %d, %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%B %d, %Y",
];

/// Parsed tooltip content.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipReading {
    pub date: NaiveDate,
    pub value: f64,
    pub unit: String,
}

/// Replaces `Q1`..`Q4` with month names so calendar parsing applies.
#[must_use]
pub fn normalize_quarter_tokens(date_text: &str) -> String {
    QUARTER_MONTHS
        .iter()
        .fold(date_text.to_owned(), |acc, (token, month)| {
            acc.replace(token, month)
        })
}

/// Earliest year a tooltip date may carry.
const MIN_YEAR: i32 = 1000;

/// Parses the date fragment of a tooltip.
///
/// Month- and quarter-granularity texts resolve to the first day of the
/// period; a bare year resolves to January 1st. Month shapes are tried
/// before day shapes, since `%d` and `%Y` would otherwise split a four-digit
/// year into a day and a two-digit year.
pub fn parse_tooltip_date(date_text: &str) -> ExtractResult<NaiveDate> {
    let normalized = normalize_quarter_tokens(date_text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if normalized.is_empty() {
        return Err(ExtractError::Parse("empty tooltip date".to_owned()));
    }

    let month_start = format!("1 {normalized}");
    let candidates = MONTH_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(&month_start, format).ok())
        .chain(
            DAY_FORMATS
                .iter()
                .filter_map(|format| NaiveDate::parse_from_str(&normalized, format).ok()),
        )
        .chain(
            (normalized.len() == 4)
                .then(|| normalized.parse::<i32>().ok())
                .flatten()
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        );

    for date in candidates {
        if date.year() >= MIN_YEAR {
            return Ok(date);
        }
    }

    Err(ExtractError::Parse(format!(
        "unrecognized tooltip date `{}`",
        date_text.trim()
    )))
}

/// Parses the value fragment, stripping metric suffix and unit label.
pub fn parse_tooltip_value(value_text: &str) -> ExtractResult<(f64, String)> {
    split_number_and_unit(value_text)
}

/// Parses tooltip markup by its date and value nodes.
///
/// Returns `Ok(None)` when the tooltip is present but empty (cursor off the
/// series, tooltip still fading in).
pub fn parse_tooltip_html(
    html: &str,
    date_selector: &str,
    value_selector: &str,
) -> ExtractResult<Option<TooltipReading>> {
    let date_selector = parse_selector(date_selector)?;
    let value_selector = parse_selector(value_selector)?;
    let fragment = Html::parse_fragment(html);

    let date_text = fragment
        .select(&date_selector)
        .next()
        .map(|node| node.text().collect::<String>());
    let value_text = fragment
        .select(&value_selector)
        .next()
        .map(|node| node.text().collect::<String>());

    match (date_text, value_text) {
        (Some(date_text), Some(value_text))
            if !date_text.trim().is_empty() && !value_text.trim().is_empty() =>
        {
            let date = parse_tooltip_date(&date_text)?;
            let (value, unit) = parse_tooltip_value(&value_text)?;
            Ok(Some(TooltipReading { date, value, unit }))
        }
        _ => Ok(None),
    }
}

pub(crate) fn parse_selector(selector: &str) -> ExtractResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ExtractError::Parse(format!("invalid css selector `{selector}`: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{normalize_quarter_tokens, parse_tooltip_date, parse_tooltip_html};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn quarter_tokens_become_month_names() {
        assert_eq!(normalize_quarter_tokens("Q3 2023"), "July 2023");
        assert_eq!(parse_tooltip_date("Q4 2022").expect("quarter"), ymd(2022, 10, 1));
    }

    #[test]
    fn supported_date_shapes_parse() {
        assert_eq!(parse_tooltip_date("2024-01-15").expect("iso"), ymd(2024, 1, 15));
        assert_eq!(parse_tooltip_date("Jan 15 2024").expect("mdy"), ymd(2024, 1, 15));
        assert_eq!(parse_tooltip_date("Jan 15, 2024").expect("mdy comma"), ymd(2024, 1, 15));
        assert_eq!(parse_tooltip_date("15 Jan 2024").expect("dmy"), ymd(2024, 1, 15));
        assert_eq!(parse_tooltip_date("January 2024").expect("month"), ymd(2024, 1, 1));
        assert_eq!(parse_tooltip_date("Feb 2024").expect("short month"), ymd(2024, 2, 1));
        assert_eq!(parse_tooltip_date("  2019 ").expect("year"), ymd(2019, 1, 1));
    }

    #[test]
    fn garbage_dates_are_rejected() {
        assert!(parse_tooltip_date("").is_err());
        assert!(parse_tooltip_date("yesterday").is_err());
        assert!(parse_tooltip_date("0024-01-20").is_err());
    }

    #[test]
    fn month_and_quarter_years_stay_four_digits() {
        assert_eq!(parse_tooltip_date("January 2024").expect("month"), ymd(2024, 1, 1));
        assert_eq!(parse_tooltip_date("December 2022").expect("month"), ymd(2022, 12, 1));
        assert_eq!(parse_tooltip_date("Feb 2024").expect("short month"), ymd(2024, 2, 1));
        assert_eq!(parse_tooltip_date("Q1 2020").expect("quarter"), ymd(2020, 1, 1));
        assert_eq!(parse_tooltip_date("Q4 2022").expect("quarter"), ymd(2022, 10, 1));
        assert_eq!(parse_tooltip_date("Jan 20 2024").expect("day"), ymd(2024, 1, 20));
        assert_eq!(parse_tooltip_date("March 21, 2023").expect("day"), ymd(2023, 3, 21));
    }

    #[test]
    fn tooltip_markup_yields_date_value_and_unit() {
        let html = r#"<div class="highcharts-tooltip"><span class="tooltip-date">Q2 2021</span>
            <span class="tooltip-value">1.25K Points</span></div>"#;
        let reading = parse_tooltip_html(html, ".tooltip-date", ".tooltip-value")
            .expect("parse")
            .expect("reading");
        assert_eq!(reading.date, ymd(2021, 4, 1));
        assert_eq!(reading.value, 1_250.0);
        assert_eq!(reading.unit, "Points");
    }

    #[test]
    fn empty_tooltip_is_none() {
        let html = r#"<div class="highcharts-tooltip"><span class="tooltip-date"></span></div>"#;
        let reading = parse_tooltip_html(html, ".tooltip-date", ".tooltip-value").expect("parse");
        assert!(reading.is_none());
    }
}
