//! Bounded retry with a fixed backoff table
//!
//! An explicit loop with an attempt counter: the policy is bounded by
//! construction and the schedule can be unit tested without a live
//! endpoint. Only transient failures are retried.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::config::RetryPolicy;
use crate::LedgerError;

/// Run `call` under the retry policy
///
/// `on_retry` is invoked once per retry attempt (metrics hook). Transient
/// errors are retried up to `policy.max_attempts` total attempts with the
/// policy's backoff schedule between them; non-transient errors return
/// immediately.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    method: &str,
    on_retry: impl Fn(),
    mut call: F,
) -> Result<T, LedgerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LedgerError>>,
{
    let mut attempt = 1usize;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                if attempt >= policy.max_attempts {
                    return Err(LedgerError::RetryExhausted {
                        attempts: attempt,
                        last: err.to_string(),
                    });
                }

                let delay_ms = policy.delay_for_attempt(attempt);
                debug!(
                    method,
                    attempt,
                    delay_ms,
                    error = %err,
                    "retrying rpc call"
                );
                on_retry();
                sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff_ms: vec![0, 0, 0],
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0usize);

        let result = with_retry(&instant_policy(3), "test", || {}, || {
            let n = calls.get() + 1;
            calls.set(n);
            async move {
                if n < 3 {
                    Err(LedgerError::Timeout(1))
                } else {
                    Ok(42u64)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Cell::new(0usize);

        let result: Result<(), _> = with_retry(&instant_policy(3), "test", || {}, || {
            calls.set(calls.get() + 1);
            async { Err(LedgerError::Call("connection reset".to_string())) }
        })
        .await;

        assert_eq!(calls.get(), 3);
        assert!(matches!(
            result,
            Err(LedgerError::RetryExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = Cell::new(0usize);

        let result: Result<(), _> = with_retry(&instant_policy(3), "test", || {}, || {
            calls.set(calls.get() + 1);
            async { Err(LedgerError::NotFound) }
        })
        .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(LedgerError::NotFound)));
    }

    #[tokio::test]
    async fn retry_hook_fires_per_retry_not_per_attempt() {
        let retries = Cell::new(0usize);

        let _: Result<(), _> = with_retry(
            &instant_policy(3),
            "test",
            || retries.set(retries.get() + 1),
            || async { Err(LedgerError::Timeout(1)) },
        )
        .await;

        // 3 attempts means 2 retries
        assert_eq!(retries.get(), 2);
    }
}
