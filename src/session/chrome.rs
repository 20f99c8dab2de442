use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::browser::tab::point::Point;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tracing::debug;

use crate::core::types::PixelRect;
use crate::error::{ExtractError, ExtractResult};
use crate::session::BrowserSession;

/// `BrowserSession` over a Chrome/Chromium instance driven by CDP.
///
/// Dropping the session closes the browser, which is also the only way to
/// cancel an extraction in flight.
pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

fn lost(err: impl Display) -> ExtractError {
    ExtractError::SessionLost(err.to_string())
}

fn missing(selector: &str, err: impl Display) -> ExtractError {
    debug!(selector, error = %err, "element lookup failed");
    ExtractError::ElementMissing {
        selector: selector.to_owned(),
    }
}

fn js_string(text: &str) -> ExtractResult<String> {
    serde_json::to_string(text)
        .map_err(|e| ExtractError::InvalidData(format!("cannot quote `{text}` for script: {e}")))
}

impl ChromeSession {
    pub fn launch(headless: bool) -> ExtractResult<Self> {
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .build()
            .map_err(|e| ExtractError::SessionLost(format!("invalid launch options: {e}")))?;
        let browser = Browser::new(options).map_err(lost)?;
        let tab = browser.new_tab().map_err(lost)?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn evaluate(&self, script: &str) -> ExtractResult<Value> {
        let remote = self
            .tab
            .evaluate(script, true)
            .map_err(|e| ExtractError::Parse(format!("script evaluation failed: {e}")))?;
        Ok(remote.value.unwrap_or(Value::Null))
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> ExtractResult<()> {
        self.tab.navigate_to(url).map_err(lost)?;
        self.tab.wait_until_navigated().map_err(lost)?;
        Ok(())
    }

    fn current_url(&self) -> ExtractResult<String> {
        Ok(self.tab.get_url())
    }

    fn page_source(&mut self) -> ExtractResult<String> {
        self.tab.get_content().map_err(lost)
    }

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> ExtractResult<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|e| missing(selector, e))
    }

    fn click(&mut self, selector: &str) -> ExtractResult<()> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|e| missing(selector, e))?;
        element.click().map_err(|e| missing(selector, e))?;
        Ok(())
    }

    fn read_attribute(
        &mut self,
        selector: &str,
        attribute: &str,
    ) -> ExtractResult<Option<String>> {
        let element = self
            .tab
            .find_element(selector)
            .map_err(|e| missing(selector, e))?;
        element.get_attribute_value(attribute).map_err(lost)
    }

    fn outer_html(&mut self, selector: &str) -> ExtractResult<Option<String>> {
        match self.tab.find_element(selector) {
            Ok(element) => element.get_content().map(Some).map_err(lost),
            Err(_) => Ok(None),
        }
    }

    fn element_rect(&mut self, selector: &str) -> ExtractResult<PixelRect> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return null; \
             const r = el.getBoundingClientRect(); \
             return JSON.stringify({{ x: r.x, y: r.y, width: r.width, height: r.height }}); }})()",
            js_string(selector)?
        );
        match self.evaluate(&script)? {
            Value::String(text) => serde_json::from_str(&text)
                .map_err(|e| ExtractError::Parse(format!("bad bounding box for `{selector}`: {e}"))),
            _ => Err(ExtractError::ElementMissing {
                selector: selector.to_owned(),
            }),
        }
    }

    fn move_pointer(&mut self, x: f64, y: f64) -> ExtractResult<()> {
        self.tab.move_mouse_to_point(Point { x, y }).map_err(lost)?;
        Ok(())
    }

    fn set_input_value(&mut self, selector: &str, value: &str) -> ExtractResult<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; \
             el.value = {}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            js_string(selector)?,
            js_string(value)?
        );
        match self.evaluate(&script)? {
            Value::Bool(true) => Ok(()),
            _ => Err(ExtractError::ElementMissing {
                selector: selector.to_owned(),
            }),
        }
    }

    fn execute_script(&mut self, script: &str) -> ExtractResult<Value> {
        self.evaluate(script)
    }
}
