//! Retry policy and a generic retry wrapper for fallible async calls.
//!
//! A [`RetryPolicy`] pairs an optional attempt cap with a [`Backoff`] curve.
//! The reference configuration is flat with zero delay (retry immediately,
//! forever or up to the cap); exponential growth is available for deployments
//! where hammering a dead endpoint is worse than waiting.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Delay curve between retry attempts.
///
/// The delay for attempt `n` (0-indexed) is `first × factor^n`, clamped to
/// `max`. `factor == 1.0` keeps the delay constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub first: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Upper bound on any single delay.
    pub max: Duration,
}

impl Backoff {
    /// Constant delay for every attempt.
    pub fn flat(delay: Duration) -> Self {
        Self {
            first: delay,
            factor: 1.0,
            max: delay,
        }
    }

    /// Exponential growth starting at `first`, capped at `max`.
    pub fn exponential(first: Duration, max: Duration) -> Self {
        Self {
            first,
            factor: 2.0,
            max,
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

impl Default for Backoff {
    /// Flat, zero-delay retry.
    fn default() -> Self {
        Self::flat(Duration::ZERO)
    }
}

/// How often a fallible call may be re-attempted.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RetryPolicy {
    /// Total attempt cap; `None` retries without bound.
    pub max_attempts: Option<u32>,
    /// Delay curve between attempts.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Unbounded flat retry with no delay.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            backoff: Backoff::default(),
        }
    }

    /// At most `attempts` tries with no delay between them.
    pub fn capped(attempts: u32) -> Self {
        Self {
            max_attempts: Some(attempts),
            backoff: Backoff::default(),
        }
    }

    /// Replace the delay curve.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Runs `op` until it succeeds, the policy is exhausted, or it fails with an
/// error `retryable` rejects. The error of the final attempt is returned
/// unchanged.
pub async fn retry<T, E, F, Fut, P>(policy: &RetryPolicy, mut op: F, retryable: P) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                let exhausted = policy.max_attempts.is_some_and(|cap| attempt >= cap);
                if exhausted || !retryable(&err) {
                    return Err(err);
                }

                warn!("attempt {attempt} failed: {err}; trying again");
                let delay = policy.backoff.next(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
