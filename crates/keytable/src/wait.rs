//! Bounded polling with exponential backoff.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Delay schedule between attempts: `initial * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay to sleep after the `attempt`-th failed try (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(5))
    }
}

/// Why a poll stopped without a value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError<E> {
    #[error("gave up after {attempts} attempts in {waited:?}")]
    TimedOut { waited: Duration, attempts: u32 },

    #[error(transparent)]
    Probe(E),
}

/// Runs `probe` until it yields `Some`, fails, or `timeout` elapses.
///
/// Sleeps between attempts never extend past the deadline, and a probe still
/// in flight at the deadline is abandoned. Dropping the returned future
/// cancels the wait.
pub async fn poll_until<T, E, F, Fut>(
    timeout: Duration,
    backoff: Backoff,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + timeout;
    let mut attempts = 0u32;

    loop {
        let outcome = tokio::time::timeout_at(deadline, probe()).await;
        attempts += 1;

        match outcome {
            Ok(Ok(Some(value))) => return Ok(value),
            Ok(Ok(None)) => {}
            Ok(Err(err)) => return Err(PollError::Probe(err)),
            Err(_) => {
                return Err(PollError::TimedOut {
                    waited: started.elapsed(),
                    attempts,
                })
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PollError::TimedOut {
                waited: started.elapsed(),
                attempts,
            });
        }

        let delay = backoff.delay(attempts - 1).min(deadline - now);
        tracing::trace!(attempt = attempts, delay_ms = delay.as_millis() as u64, "probe not ready");
        tokio::time::sleep(delay).await;
    }
}
