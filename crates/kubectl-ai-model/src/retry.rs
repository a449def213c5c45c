// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Retry wrapper around `Chat.send_streaming` (§4.6): 3 attempts, initial
//! backoff 10s, max 60s, factor 2, with jitter. Cancellation aborts
//! immediately rather than waiting out the remaining backoff.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with jitter for `attempt` (0-indexed), capped at
    /// `max_delay` (§4.6). Exposed so callers retrying by hand — e.g. the
    /// engine's own `send_with_retry`, which can't use
    /// [`retry_with_backoff`]'s closure-based API across a borrowed `Chat`
    /// — still compute the documented jittered delay instead of a
    /// deterministic one.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let exponential = base_ms * self.backoff_multiplier.powi(attempt as i32);
        let capped = exponential.min(self.max_delay.as_millis() as f64);
        let jitter_range = capped * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range;
        let delay = capped + jitter - (jitter_range / 2.0);
        Duration::from_millis(delay.max(0.0) as u64)
    }
}

/// Retry `operation` per [`RetryConfig`]. If `cancelled` resolves before a
/// retry completes or before a backoff sleep elapses, the attempt loop exits
/// immediately with the last error seen (§4.6 "Cancellation aborts
/// immediately").
pub async fn retry_with_backoff<F, Fut, T, E, C>(
    config: RetryConfig,
    mut operation: F,
    mut cancelled: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: FnMut() -> bool,
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        if cancelled() {
            break;
        }
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_error = Some(err);
                if attempt < config.max_attempts - 1 && !cancelled() {
                    tokio::select! {
                        _ = sleep(config.calculate_delay(attempt)) => {}
                    }
                }
            }
        }
    }

    Err(last_error.expect("at least one attempt always runs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_matches_spec_numbers() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(10));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn delay_grows_exponentially() {
        let config = RetryConfig { jitter_factor: 0.0, ..RetryConfig::default() };
        assert!(config.calculate_delay(1) > config.calculate_delay(0));
        assert!(config.calculate_delay(2) > config.calculate_delay(1));
    }

    #[test]
    fn delay_is_capped_at_max() {
        let config = RetryConfig { jitter_factor: 0.0, ..RetryConfig::default() };
        assert!(config.calculate_delay(10) <= config.max_delay);
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_sleeping() {
        let config = RetryConfig { initial_delay: Duration::from_millis(1), ..RetryConfig::default() };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result: Result<i32, &str> = retry_with_backoff(
            config,
            move || {
                calls2.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            },
            || false,
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let config = RetryConfig { initial_delay: Duration::from_millis(1), max_attempts: 3, ..RetryConfig::default() };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result: Result<i32, &str> = retry_with_backoff(
            config,
            move || {
                let n = calls2.fetch_add(1, Ordering::SeqCst) + 1;
                async move { if n < 3 { Err("transient") } else { Ok(42) } }
            },
            || false,
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let config = RetryConfig { initial_delay: Duration::from_millis(1), max_attempts: 2, ..RetryConfig::default() };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result: Result<i32, &str> = retry_with_backoff(
            config,
            move || {
                calls2.fetch_add(1, Ordering::SeqCst);
                async { Err("fail") }
            },
            || false,
        )
        .await;
        assert_eq!(result, Err("fail"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_further_attempts() {
        let config = RetryConfig { initial_delay: Duration::from_millis(1), max_attempts: 5, ..RetryConfig::default() };
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let result: Result<i32, &str> = retry_with_backoff(
            config,
            move || {
                calls2.fetch_add(1, Ordering::SeqCst);
                async { Err("fail") }
            },
            || true,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
