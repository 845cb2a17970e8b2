use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Closed-set transience classification for retryable operations.
///
/// Implementors decide at their own boundary which failures are worth
/// retrying; the controller never inspects error text.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Terminal outcome of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Display> {
    /// The operation failed with a non-transient error; not retried.
    #[error("{0}")]
    Aborted(E),
    /// Every attempt reported transient contention.
    #[error("still contended after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Delay before the attempt after `attempt`: `initial * 2^(attempt-1)`.
pub fn backoff_delay(attempt: u32, initial: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    initial.saturating_mul(2u32.saturating_pow(attempt - 1))
}

/// Run `op`, retrying transient failures with exponentially doubling
/// delays, up to `max_attempts` attempts in total.
///
/// Non-transient failures propagate immediately as [`RetryError::Aborted`];
/// exhausting `max_attempts` yields [`RetryError::Exhausted`] so that
/// callers can tell "gave up after contention" from "operation invalid".
pub async fn with_retry<T, E, F, Fut>(
    mut op: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(RetryError::Aborted(err)),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                let delay = backoff_delay(attempt, initial_delay);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient contention, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug)]
    struct Busy {
        transient: bool,
    }

    impl fmt::Display for Busy {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(if self.transient { "busy" } else { "rejected" })
        }
    }

    impl Transient for Busy {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let initial = Duration::from_millis(100);
        assert_eq!(backoff_delay(1, initial), Duration::from_millis(100));
        assert_eq!(backoff_delay(2, initial), Duration::from_millis(200));
        assert_eq!(backoff_delay(3, initial), Duration::from_millis(400));
        assert_eq!(backoff_delay(4, initial), Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_never_sleeps() {
        let calls = RefCell::new(0u32);
        let started = Instant::now();

        let result = with_retry(
            || {
                *calls.borrow_mut() += 1;
                async { Ok::<_, Busy>(42) }
            },
            5,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_failure_is_not_retried() {
        let calls = RefCell::new(0u32);

        let result: Result<(), _> = with_retry(
            || {
                *calls.borrow_mut() += 1;
                async { Err(Busy { transient: false }) }
            },
            5,
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(RetryError::Aborted(_))));
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_until_success() {
        let calls = RefCell::new(0u32);

        let result = with_retry(
            || {
                *calls.borrow_mut() += 1;
                let attempt = *calls.borrow();
                async move {
                    if attempt < 3 {
                        Err(Busy { transient: true })
                    } else {
                        Ok(attempt)
                    }
                }
            },
            5,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(*calls.borrow(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_after_exactly_max_attempts_with_doubling_delays() {
        let attempt_times = RefCell::new(Vec::new());

        let result: Result<(), _> = with_retry(
            || {
                attempt_times.borrow_mut().push(Instant::now());
                async { Err(Busy { transient: true }) }
            },
            5,
            Duration::from_secs(1),
        )
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("expected Exhausted, got {other:?}"),
        }

        let times = attempt_times.borrow();
        assert_eq!(times.len(), 5);
        // Gaps between attempts: 1s, 2s, 4s, 8s under the paused clock.
        for (i, expected_secs) in [1u64, 2, 4, 8].iter().enumerate() {
            assert_eq!(
                times[i + 1] - times[i],
                Duration::from_secs(*expected_secs),
                "gap after attempt {}",
                i + 1
            );
        }
    }
}
