// Readiness gate: bounded retries around an operation that fails until a service is up.
//
// Purpose
// - Turn "not ready yet" into eventual success, or into a fatal error once the budget is spent.
//
// Responsibilities
// - Invoke the operation until it succeeds, attempts run out, or the token is cancelled.
// - Sleep according to the backoff policy between attempts, waking early on cancellation.
// - Report the attempt count and the last error.

use crate::modules::ephemeral_store::readiness::policy::RetryPolicy;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    #[error("non transient error on attempt {attempts}: {error}")]
    Rejected {
        attempts: u32,
        #[source]
        error: E,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::Rejected { attempts, .. }
            | RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

/// Retries `operation` on every error.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_when(policy, cancel, operation, |_| true).await
}

/// Retries `operation` while `is_transient` accepts the error it returned.
pub async fn retry_when<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
    is_transient: P,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled { attempts: attempt });
        }
        attempt += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
            result = operation() => result,
        };
        let error = match result {
            Ok(value) => {
                debug!(attempt, "operation succeeded");
                return Ok(value);
            }
            Err(error) => error,
        };
        if !is_transient(&error) {
            return Err(RetryError::Rejected {
                attempts: attempt,
                error,
            });
        }
        if attempt >= max_attempts {
            warn!(attempts = attempt, error = %error, "retry budget exhausted");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: error,
            });
        }
        let delay = policy.backoff.delay(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "not ready, retrying");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts: attempt }),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
