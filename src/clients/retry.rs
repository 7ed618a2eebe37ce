//! Bounded retry with a fixed delay for upstream calls.
//!
//! Attempt outcomes distinguish transient failures (transport errors,
//! 5xx) from definitive answers (4xx, business rejections): a terminal
//! error short-circuits immediately, while retryable ones are retried up
//! to the policy's attempt count.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// How one attempt failed.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// Worth trying again (the upstream may recover).
    Retryable(E),
    /// Definitive; retrying would return the same answer.
    Terminal(E),
}

/// Why the whole call failed.
#[derive(Debug)]
pub enum RetryOutcome<E> {
    /// An attempt returned a definitive error.
    Terminal(E),
    /// Every attempt failed transiently; carries the last error.
    Exhausted(E),
}

/// Run `attempt` under the policy. `target` names the upstream for logs.
pub async fn run<T, E, F, Fut>(
    policy: &RetryPolicy,
    target: &'static str,
    mut attempt: F,
) -> Result<T, RetryOutcome<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Terminal(e)) => return Err(RetryOutcome::Terminal(e)),
            Err(AttemptError::Retryable(e)) => {
                if attempts >= max_attempts {
                    warn!(upstream = target, attempts, error = %e, "giving up on upstream call");
                    return Err(RetryOutcome::Exhausted(e));
                }
                warn!(upstream = target, attempt = attempts, error = %e, "retrying upstream call");
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
