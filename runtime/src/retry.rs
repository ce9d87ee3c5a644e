//! Exponential backoff.
//!
//! A [`Backoff`] maps the number of attempts already spent to the wait
//! before the next one. The processor uses it to schedule failed tasks (the
//! attempt budget itself lives on each [`TaskEnvelope`](crate::TaskEnvelope));
//! [`retry_with_backoff`] uses it for startup steps such as the first
//! connection to Redis or `PostgreSQL`.
//!
//! ```rust
//! use std::time::Duration;
//! use ticket_runtime::retry::Backoff;
//!
//! let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(300));
//! assert_eq!(backoff.delay(0), Duration::from_secs(1));
//! assert_eq!(backoff.delay(3), Duration::from_secs(8));
//! assert_eq!(backoff.delay(20), Duration::from_secs(300));
//! ```

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Delay schedule: `initial * factor^retried`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Wait after the first failure.
    pub initial: Duration,
    /// Upper bound for any single wait.
    pub max: Duration,
    /// Growth per failure.
    pub factor: u32,
}

impl Backoff {
    /// Doubling backoff between `initial` and `max`.
    #[must_use]
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            factor: 2,
        }
    }

    /// Set the growth factor (1 gives a constant delay).
    #[must_use]
    pub const fn with_factor(mut self, factor: u32) -> Self {
        self.factor = factor;
        self
    }

    /// Wait before the next attempt when `retried` attempts already failed.
    #[must_use]
    pub fn delay(&self, retried: u32) -> Duration {
        self.factor
            .checked_pow(retried)
            .and_then(|scale| self.initial.checked_mul(scale))
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// [`delay`](Self::delay) scaled by a random factor in `0.5..=1.0`, so
    /// tasks that failed together do not come back together.
    #[must_use]
    pub fn jittered(&self, retried: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        self.delay(retried).mul_f64(jitter)
    }
}

/// Run `operation` up to `attempts` times, sleeping per `backoff` in between.
///
/// At least one attempt is always made.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(
    backoff: Backoff,
    attempts: u32,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut failed = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if failed > 0 {
                    tracing::info!(failed, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if failed + 1 >= attempts => {
                tracing::error!(attempts, error = %e, "Operation failed, giving up");
                return Err(e);
            }
            Err(e) => {
                let delay = backoff.delay(failed);
                tracing::warn!(
                    attempt = failed + 1,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
                failed += 1;
            }
        }
    }
}
