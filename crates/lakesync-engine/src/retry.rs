//! Bounded fixed-delay retry policy.
//!
//! Kept structurally separate from the operations it wraps so the delay
//! behavior is testable with an injected sleeper instead of a wall clock.

use std::time::Duration;

/// Blocking sleep abstraction.
pub trait Sleeper {
    /// Sleep for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fixed-delay retry policy: up to `max_retries` retries after the initial
/// attempt, each preceded by the same delay. No backoff growth, no jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Policy used around commit initiation: 2 retries, 1 second apart.
    #[must_use]
    pub fn commit_start() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(1),
        }
    }

    /// Total attempts including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Run `op`, retrying while `is_retryable` holds for the error.
    ///
    /// Returns the last error once attempts are exhausted or a
    /// non-retryable error appears.
    ///
    /// # Errors
    ///
    /// Propagates the final error from `op`.
    pub fn run<T, E, F, P>(
        &self,
        sleeper: &dyn Sleeper,
        mut op: F,
        is_retryable: P,
    ) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if is_retryable(&err) && attempt < self.max_attempts() => {
                    tracing::error!(
                        attempt,
                        max_attempts = self.max_attempts(),
                        delay_ms = self.delay.as_millis() as u64,
                        error = %err,
                        "Retryable error, will retry after fixed delay"
                    );
                    sleeper.sleep(self.delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
