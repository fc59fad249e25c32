// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded retry with exponential backoff around collaborator calls.
//
// Only Transient errors (renderer crashes and timeouts, interrupted I/O) are
// retried. User-action and permanent errors are returned on the first
// occurrence. The mining loop is never wrapped in a retry.

use std::time::Duration;

use ignis_core::config::RetrySettings;
use ignis_core::error::IgnisError;
use ignis_core::human_errors::classify;
use ignis_core::types::ErrorClass;
use tracing::{debug, info, warn};

/// Backoff policy for collaborator calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Outcome of [`should_retry`].
#[derive(Debug)]
pub enum RetryDecision {
    /// Sleep this long, then call again.
    RetryAfter(Duration),
    /// The error class is not worth retrying.
    GiveUp(ErrorClass),
    /// `max_retries` already spent.
    Exhausted,
}

/// Classify `err` and decide whether attempt number `attempt` gets another go.
pub fn should_retry(err: &IgnisError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match classify(err) {
        ErrorClass::Permanent => RetryDecision::GiveUp(ErrorClass::Permanent),
        ErrorClass::UserAction => RetryDecision::GiveUp(ErrorClass::UserAction),
        ErrorClass::Transient => {
            if attempt >= config.max_retries {
                warn!(attempt, max = config.max_retries, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                let delay = compute_delay(attempt, config);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

/// Run `op`, retrying Transient failures per `config`. Blocks the calling
/// thread during backoff.
pub fn with_retry<T>(
    config: &RetryConfig,
    operation: &str,
    mut op: impl FnMut() -> Result<T, IgnisError>,
) -> Result<T, IgnisError> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation, retries = attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => match should_retry(&err, attempt, config) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                RetryDecision::GiveUp(_) | RetryDecision::Exhausted => return Err(err),
            },
        }
    }
}

/// `min(base * 2^attempt + jitter, max_delay)`.
fn compute_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));
    let total_ms = exp_ms.saturating_add(jitter(base_ms, attempt));
    let capped_ms = total_ms.min(config.max_delay.as_millis() as u64);

    Duration::from_millis(capped_ms)
}

/// Deterministic spread in [0, base) from the attempt number.
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn defaults_follow_settings() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn retry_respects_max() {
        let config = fast(3);
        let err = IgnisError::RenderTimeout { seconds: 1 };
        assert!(matches!(should_retry(&err, 0, &config), RetryDecision::RetryAfter(_)));
        assert!(matches!(should_retry(&err, 3, &config), RetryDecision::Exhausted));
    }

    #[test]
    fn permanent_error_never_retries() {
        let err = IgnisError::Stamp("broken xref".into());
        assert!(matches!(
            should_retry(&err, 0, &fast(3)),
            RetryDecision::GiveUp(ErrorClass::Permanent)
        ));
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let calls = Cell::new(0);
        let result = with_retry(&fast(2), "render", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(IgnisError::Render("soffice crashed".into()))
            } else {
                Ok("pdf")
            }
        });
        assert_eq!(result.expect("third call succeeds"), "pdf");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_bounded_retries() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&fast(2), "render", || {
            calls.set(calls.get() + 1);
            Err(IgnisError::RenderTimeout { seconds: 1 })
        });
        assert!(matches!(result, Err(IgnisError::RenderTimeout { .. })));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn user_errors_fail_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&fast(5), "render", || {
            calls.set(calls.get() + 1);
            Err(IgnisError::Template("DRAFT.docx missing".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn delay_increases_with_attempts() {
        let config = RetryConfig::default();
        let d0 = compute_delay(0, &config);
        let d1 = compute_delay(1, &config);
        let d2 = compute_delay(2, &config);
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig::default();
        assert!(compute_delay(20, &config) <= Duration::from_secs(5));
    }
}
