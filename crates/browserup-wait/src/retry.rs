//! The bounded retry executor.

use std::future::Future;
use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, trace};

use crate::error::WaitError;
use crate::strategy::WaitStrategy;

/// What one attempt of a polled operation produced.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// The operation finished; stop polling.
    Done(T),
    /// Not there yet (or a transient failure); poll again.
    Retry(E),
    /// A terminal failure; abort immediately without consuming the
    /// remaining attempt budget.
    Fatal(E),
}

/// Runs `operation` until it completes, fails terminally, or the strategy's
/// budget is exhausted.
///
/// Each retryable failure sleeps the strategy's fixed delay before the next
/// attempt. A sleep that would overrun the elapsed-time budget is not
/// started; the wait expires instead.
///
/// # Errors
///
/// - [`WaitError::Fatal`] when the operation classifies a failure as
///   non-retryable
/// - [`WaitError::AttemptsExhausted`] after `max_attempts` invocations,
///   carrying the final attempt's error
/// - [`WaitError::TimedOut`] when the elapsed budget expires, carrying the
///   final attempt's error
pub async fn retry<T, E, F, Fut>(
    strategy: WaitStrategy,
    mut operation: F,
) -> Result<T, WaitError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = RetryOutcome<T, E>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        trace!(attempt, "wait attempt");
        match operation().await {
            RetryOutcome::Done(value) => {
                debug!(attempt, "wait completed");
                return Ok(value);
            }
            RetryOutcome::Fatal(error) => {
                debug!(attempt, %error, "wait hit terminal failure");
                return Err(WaitError::Fatal(error));
            }
            RetryOutcome::Retry(error) => {
                if attempt >= strategy.max_attempts {
                    return Err(WaitError::AttemptsExhausted {
                        attempts: attempt,
                        last: error,
                    });
                }
                let waited = started.elapsed();
                if waited + strategy.delay >= strategy.max_elapsed {
                    return Err(WaitError::TimedOut {
                        waited,
                        last: error,
                    });
                }
                trace!(attempt, error = %error, "retrying after delay");
                sleep(strategy.delay).await;
            }
        }
    }
}
