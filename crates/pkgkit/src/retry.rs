//! Retry logic with exponential backoff for transient errors.

use crate::error::{Error, Result};
use reconcile::Context;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of the backoff sleep, so cancellation is noticed quickly
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Backoff settings for retrying network and lock failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after the given 0-indexed attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Sleep for `delay`, returning early with an error once the context ends
fn wait(ctx: &Context, delay: Duration) -> Result<()> {
    let until = Instant::now() + delay;
    loop {
        ctx.check()?;
        let now = Instant::now();
        if now >= until {
            return Ok(());
        }
        thread::sleep(WAIT_SLICE.min(until - now));
    }
}

/// Run `operation`, retrying while it fails with a retryable error.
///
/// `on_retry` receives the 1-indexed attempt that failed, the error and the
/// delay before the next attempt.
pub fn with_retry<T, F, R>(
    ctx: &Context,
    policy: &RetryPolicy,
    mut on_retry: R,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
    R: FnMut(u32, &Error, Duration),
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt + 1 >= attempts => return Err(e),
            Err(e) => {
                let delay = policy.delay_for_attempt(attempt);
                on_retry(attempt + 1, &e, delay);
                wait(ctx, delay)?;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    fn network() -> Error {
        Error::Network {
            manager: "brew".into(),
            message: "timeout".into(),
        }
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(8));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(10));
    }

    #[test]
    fn test_non_retryable_error_returns_immediately() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&Context::new(), &fast(3), |_, _, _| {}, || {
            attempts.set(attempts.get() + 1);
            Err(Error::NotFound {
                manager: "brew".into(),
                name: "foo".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_eventual_success() {
        let attempts = Cell::new(0);
        let retries = Cell::new(0);
        let result = with_retry(
            &Context::new(),
            &fast(3),
            |_, _, _| retries.set(retries.get() + 1),
            || {
                attempts.set(attempts.get() + 1);
                if attempts.get() < 3 { Err(network()) } else { Ok(42) }
            },
        );
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
        assert_eq!(retries.get(), 2);
    }

    #[test]
    fn test_all_attempts_fail() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&Context::new(), &fast(3), |_, _, _| {}, || {
            attempts.set(attempts.get() + 1);
            Err(network())
        });
        assert!(matches!(result, Err(Error::Network { .. })));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_cancellation_stops_backoff() {
        let ctx = Context::new();
        let attempts = Cell::new(0);
        let result: Result<()> = with_retry(&ctx, &fast(5), |_, _, _| ctx.cancel(), || {
            attempts.set(attempts.get() + 1);
            Err(network())
        });
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(attempts.get(), 1);
    }
}
