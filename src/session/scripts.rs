//! In-page tooltip scan.
//!
//! The per-step scan costs one browser round trip per pixel. The scripted
//! variant runs the same walk inside the page and returns every distinct
//! tooltip reading at once.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::PixelRect;
use crate::error::{ExtractError, ExtractResult};

/// Parameters of one in-page pointer walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub chart_selector: String,
    pub tooltip_selector: String,
    pub date_selector: String,
    pub value_selector: String,
    /// Plot rectangle in viewport coordinates.
    pub plot: PixelRect,
    pub start_x: f64,
    pub end_x: f64,
    pub step_px: f64,
    pub y: f64,
    /// Stop after this many distinct dates; `None` walks the whole span.
    pub max_points: Option<usize>,
    pub settle_ms: u64,
}

/// One tooltip reading taken by the script, text still unparsed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScannedText {
    pub date: String,
    pub value: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScanOutcome {
    #[serde(rename = "dataPoints", default)]
    pub data_points: Vec<ScannedText>,
    #[serde(default)]
    pub logs: Vec<String>,
}

const SCAN_TEMPLATE: &str = r#"(async () => {
  const req = __REQUEST__;
  const logs = [];
  const dataPoints = [];
  const chart = document.querySelector(req.chart_selector);
  if (!chart) {
    return JSON.stringify({ dataPoints, logs: ["chart root not found"] });
  }
  const sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));
  const read = () => {
    const tip = document.querySelector(req.tooltip_selector);
    if (!tip) return null;
    const d = tip.querySelector(req.date_selector);
    const v = tip.querySelector(req.value_selector);
    if (!d || !v) return null;
    const date = d.textContent.trim();
    const value = v.textContent.trim();
    return date && value ? { date, value } : null;
  };
  const dir = req.end_x >= req.start_x ? 1 : -1;
  const step = Math.max(1, Math.abs(req.step_px)) * dir;
  let last = null;
  for (let x = req.start_x; dir > 0 ? x <= req.end_x : x >= req.end_x; x += step) {
    const init = { bubbles: true, clientX: x, clientY: req.y };
    chart.dispatchEvent(new MouseEvent("mousemove", init));
    await sleep(req.settle_ms);
    const hit = read();
    if (!hit) continue;
    if (hit.date !== last) {
      dataPoints.push({ date: hit.date, value: hit.value, x, y: req.y });
      last = hit.date;
      if (req.max_points !== null && dataPoints.length >= req.max_points) break;
    }
  }
  logs.push(`scanned ${dataPoints.length} points`);
  return JSON.stringify({ dataPoints, logs });
})()"#;

/// Renders the scan script with `request` embedded as a JSON literal.
pub fn build_scan_script(request: &ScanRequest) -> ExtractResult<String> {
    let literal = serde_json::to_string(request)
        .map_err(|e| ExtractError::InvalidData(format!("scan request is not serializable: {e}")))?;
    Ok(SCAN_TEMPLATE.replace("__REQUEST__", &literal))
}

/// Recovers the request embedded by [`build_scan_script`].
pub(crate) fn embedded_request(script: &str) -> Option<ScanRequest> {
    let start = script.find("const req = ")? + "const req = ".len();
    let line = script[start..].lines().next()?;
    serde_json::from_str(line.trim_end().trim_end_matches(';')).ok()
}

/// Decodes a script result, which arrives as a JSON string or an object.
pub fn parse_scan_outcome(value: Value) -> ExtractResult<ScanOutcome> {
    let decoded = match value {
        Value::String(text) => serde_json::from_str(&text),
        other => serde_json::from_value(other),
    };
    decoded.map_err(|e| ExtractError::Parse(format!("unexpected scan script result: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ScanRequest, build_scan_script, parse_scan_outcome};
    use crate::core::types::PixelRect;

    #[test]
    fn script_embeds_request_literal() {
        let request = ScanRequest {
            chart_selector: "#chart".to_owned(),
            tooltip_selector: ".highcharts-tooltip".to_owned(),
            date_selector: ".tooltip-date".to_owned(),
            value_selector: ".tooltip-value".to_owned(),
            plot: PixelRect::new(10.0, 20.0, 600.0, 300.0),
            start_x: 605.0,
            end_x: 15.0,
            step_px: 1.0,
            y: 170.0,
            max_points: Some(8),
            settle_ms: 25,
        };
        let script = build_scan_script(&request).expect("script");
        assert!(script.contains(r##""chart_selector":"#chart""##));
        assert!(script.contains(r#""max_points":8"#));
        assert!(!script.contains("__REQUEST__"));
    }

    #[test]
    fn outcome_decodes_from_string_or_object() {
        let text = json!(r#"{"dataPoints":[{"date":"Jan 2024","value":"1.5K","x":10,"y":5}],"logs":["ok"]}"#);
        let outcome = parse_scan_outcome(text).expect("string result");
        assert_eq!(outcome.data_points.len(), 1);
        assert_eq!(outcome.data_points[0].value, "1.5K");

        let object = json!({"dataPoints": [], "logs": []});
        assert!(parse_scan_outcome(object).expect("object result").data_points.is_empty());
        assert!(parse_scan_outcome(json!(42)).is_err());
    }
}
