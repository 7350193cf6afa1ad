//! Bounded retry with a fixed delay between attempts.
//!
//! There is deliberately no exponential growth and no jitter: the lock
//! protocol's worst-case wait is exactly `max_attempts × delay`, and tests
//! can reproduce every schedule.

use std::future::Future;
use std::time::Duration;

/// How many times to call an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
    pub const DEFAULT_DELAY_MS: u64 = 1000;

    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Attempt count actually used; zero is treated as a single attempt.
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Upper bound on the time spent sleeping between attempts.
    pub fn max_wait(&self) -> Duration {
        self.delay * self.effective_attempts().saturating_sub(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(Self::DEFAULT_DELAY_MS),
        )
    }
}

/// Position of the current call within a retry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Zero-based attempt index.
    pub index: u32,
    pub max_attempts: u32,
}

impl Attempt {
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.max_attempts
    }

    /// One-based attempt number, for log output.
    pub fn number(&self) -> u32 {
        self.index + 1
    }
}

/// Call `operation` until it succeeds or the policy's attempts run out.
///
/// The operation receives the current [`Attempt`] so it can act differently
/// on the final try. The error of the final attempt is returned unchanged.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.effective_attempts();
    let mut index = 0;

    loop {
        let attempt = Attempt {
            index,
            max_attempts,
        };
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt.is_last() => return Err(err),
            Err(_) => {
                tracing::debug!(
                    attempt = attempt.number(),
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    "attempt failed, retrying"
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                index += 1;
            }
        }
    }
}
