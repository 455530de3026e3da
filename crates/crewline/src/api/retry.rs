//! Retry with exponential backoff for transient completion failures.
//!
//! Retries 429, 500, 502, 503, 504 and network errors. Client errors (400,
//! 401, 403, 404, 422) fail immediately. The retry budget comes from the
//! agent's [`ModelBinding`](super::router::ModelBinding).

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Backoff settings for one agent's completion calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = fail on the first error).
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed), capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exp);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

/// Whether an error string looks like a transient failure.
pub fn is_transient_error(error: &str) -> bool {
    if ["429", "500", "502", "503", "504"]
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")))
    {
        return true;
    }

    let lower = error.to_lowercase();
    [
        "request failed:",
        "connection reset",
        "connection refused",
        "timed out",
        "timeout",
        "broken pipe",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

/// Whether an error string is a client error that retrying cannot fix.
pub fn is_permanent_error(error: &str) -> bool {
    ["HTTP 400", "HTTP 401", "HTTP 403", "HTTP 404", "HTTP 422"]
        .iter()
        .any(|p| error.contains(p))
}

/// Run `call` until it succeeds, fails permanently, or the retry budget is spent.
pub async fn retry_api_call<T, F, Fut>(config: &RetryConfig, mut call: F) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut attempt = 0;
    loop {
        let err = match call().await {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let retryable = is_transient_error(&err) && !is_permanent_error(&err);
        if !retryable || attempt >= config.max_retries {
            return Err(err);
        }
        let delay = config.delay_for_attempt(attempt);
        warn!(
            "Transient API error (attempt {}/{}): {err}. Retrying in {delay:?}",
            attempt + 1,
            config.max_retries,
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
