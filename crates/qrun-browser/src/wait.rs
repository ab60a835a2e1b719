//! Polling waits for conditions inside a page.
//!
//! Test pages signal completion by publishing a value on `window`; the
//! driver has no push channel for it, so every wait here is a poll loop
//! with a timeout.

use crate::error::{BrowserError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Default timeout for wait operations (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default poll interval for checking conditions (100ms).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for wait operations.
#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    /// Maximum time to wait for the condition.
    pub timeout: Duration,

    /// How often to check if the condition is satisfied.
    pub poll_interval: Duration,
}

impl WaitConfig {
    /// Creates a new wait configuration.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Creates a config with custom timeout and default poll interval.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }

    /// Creates a config from an optional timeout; `None` waits forever.
    pub fn from_optional(timeout: Option<Duration>) -> Self {
        Self::with_timeout(timeout.unwrap_or(Duration::MAX))
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

/// Polls until `poll` yields a value, with timeout.
///
/// `Ok(None)` and `Err(_)` both mean "not yet": a page that is still
/// navigating rejects evaluations, and that is not a reason to give up.
///
/// # Example
///
/// ```ignore
/// let report: TestPageReport = wait_for_value(
///     || page.read_global("qrun/done"),
///     WaitConfig::with_timeout(Duration::from_secs(60)),
///     "QUnit done",
/// ).await?;
/// ```
pub async fn wait_for_value<T, F, Fut>(poll: F, config: WaitConfig, description: &str) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();

    loop {
        if let Ok(Some(value)) = poll().await {
            return Ok(value);
        }

        if start.elapsed() >= config.timeout {
            return Err(BrowserError::WaitTimeout {
                condition: description.to_string(),
                timeout: config.timeout,
            });
        }

        sleep(config.poll_interval).await;
    }
}

/// Waits for a condition that returns a `Result<bool>`.
///
/// Errors are treated as transient, like `false`.
pub async fn wait_for_result<F, Fut>(condition: F, config: WaitConfig, description: &str) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    wait_for_value(
        || {
            let check = condition();
            async move { Ok(check.await?.then_some(())) }
        },
        config,
        description,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn wait_for_value_succeeds_immediately() {
        let value = wait_for_value(|| async { Ok(Some(7)) }, WaitConfig::default(), "seven")
            .await
            .unwrap();

        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn wait_for_value_retries_through_errors() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let value = wait_for_value(
            move || {
                let c = counter_clone.clone();
                async move {
                    match c.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(BrowserError::ScriptExecutionFailed("navigating".into())),
                        1 | 2 => Ok(None),
                        n => Ok(Some(n)),
                    }
                }
            },
            WaitConfig::new(Duration::from_secs(5), Duration::from_millis(1)),
            "counter >= 3",
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn wait_for_value_times_out() {
        let result: Result<u32> = wait_for_value(
            || async { Ok(None) },
            WaitConfig::new(Duration::from_millis(100), Duration::from_millis(10)),
            "impossible value",
        )
        .await;

        assert!(matches!(
            result,
            Err(BrowserError::WaitTimeout { ref condition, .. }) if condition == "impossible value"
        ));
    }

    #[tokio::test]
    async fn wait_for_result_maps_booleans() {
        let result = wait_for_result(
            || async { Ok(true) },
            WaitConfig::default(),
            "ready",
        )
        .await;
        assert!(result.is_ok());

        let result = wait_for_result(
            || async { Ok(false) },
            WaitConfig::new(Duration::from_millis(50), Duration::from_millis(10)),
            "never",
        )
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn missing_timeout_waits_forever() {
        let config = WaitConfig::from_optional(None);
        assert_eq!(config.timeout, Duration::MAX);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);

        let config = WaitConfig::from_optional(Some(Duration::from_secs(2)));
        assert_eq!(config.timeout, Duration::from_secs(2));
    }
}
