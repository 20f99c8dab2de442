use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ExtractError, ExtractResult};

/// Bounded retry with exponential backoff for transient UI failures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Wall-clock budget across all attempts.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            deadline_ms: None,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ExtractResult<()> {
        if self.max_attempts == 0 {
            return Err(ExtractError::InvalidData(
                "retry max_attempts must be >= 1".to_owned(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ExtractError::InvalidData(
                "retry multiplier must be finite and >= 1".to_owned(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ExtractError::InvalidData(
                "retry max_delay_ms must be >= initial_delay_ms".to_owned(),
            ));
        }
        Ok(())
    }

    /// Backoff before retry number `attempt` (1-based), capped at the max.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Runs `op` until it succeeds, fails non-transiently, or the budget is
    /// spent. `pause` performs the backoff wait.
    ///
    /// Exhausting retries on a missing element surfaces as
    /// [`ExtractError::TransientUi`] naming `label`; other transient errors
    /// are returned as last seen.
    pub fn run<T>(
        &self,
        label: &str,
        mut op: impl FnMut(u32) -> ExtractResult<T>,
        mut pause: impl FnMut(Duration),
    ) -> ExtractResult<T> {
        let started = Instant::now();
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => err,
            };

            let out_of_time = self
                .deadline_ms
                .is_some_and(|deadline| started.elapsed() >= Duration::from_millis(deadline));
            if attempt >= max_attempts || out_of_time {
                warn!(label, attempts = attempt, error = %err, "retry budget exhausted");
                return Err(match err {
                    ExtractError::ElementMissing { .. } | ExtractError::TransientUi { .. } => {
                        ExtractError::TransientUi {
                            selector: label.to_owned(),
                            attempts: attempt,
                        }
                    }
                    other => other,
                });
            }

            let delay = self.delay_for_attempt(attempt);
            debug!(
                label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying after transient failure"
            );
            pause(delay);
            attempt += 1;
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_multiplier() -> f64 {
    2.0
}
