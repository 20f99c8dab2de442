mod fixture;
mod retry;
mod scripts;

#[cfg(feature = "chrome")]
mod chrome;

pub use fixture::{FixtureSession, SyntheticChart, TooltipDateStyle};
pub use retry::RetryPolicy;
pub use scripts::{ScanOutcome, ScanRequest, ScannedText, build_scan_script, parse_scan_outcome};

#[cfg(feature = "chrome")]
pub use chrome::ChromeSession;

use std::time::Duration;

use serde_json::Value;

use crate::core::types::PixelRect;
use crate::error::ExtractResult;

/// Contract implemented by any browser-automation backend.
///
/// Every call blocks until the page has answered. Selectors are CSS
/// selectors against the live document; coordinates are viewport pixels.
/// Errors distinguish a missing element (`ElementMissing`, retryable) from a
/// dead session (`SessionLost`, fatal).
pub trait BrowserSession {
    fn navigate(&mut self, url: &str) -> ExtractResult<()>;

    fn current_url(&self) -> ExtractResult<String>;

    /// Serialized markup of the whole current document.
    fn page_source(&mut self) -> ExtractResult<String>;

    fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> ExtractResult<()>;

    fn click(&mut self, selector: &str) -> ExtractResult<()>;

    fn read_attribute(&mut self, selector: &str, attribute: &str)
    -> ExtractResult<Option<String>>;

    /// Outer markup of the first match, `None` when nothing matches.
    fn outer_html(&mut self, selector: &str) -> ExtractResult<Option<String>>;

    /// Bounding box of the first match in viewport coordinates.
    fn element_rect(&mut self, selector: &str) -> ExtractResult<PixelRect>;

    fn move_pointer(&mut self, x: f64, y: f64) -> ExtractResult<()>;

    /// Sets an input's value and fires its change event.
    fn set_input_value(&mut self, selector: &str, value: &str) -> ExtractResult<()>;

    /// Evaluates script in the page. Backends without script support return
    /// `Unsupported`.
    fn execute_script(&mut self, script: &str) -> ExtractResult<Value>;

    /// Lets the page settle (animations, tooltip fade-in, backoff).
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
