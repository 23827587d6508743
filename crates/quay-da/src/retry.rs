//! Dispersal retry with error classification.
//!
//! Classification is a pure function from a failed attempt to a
//! [`RetryDecision`]; [`disperse_with_retry`] is the loop that acts on it.
//! Keeping them apart lets the policy be tested without a clock.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{DaError, DisperseError, StatusCode};

/// What to do after a failed dispersal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Deterministic failure; give up now.
    Abort,
    /// Transient failure; try again immediately.
    RetryNow,
    /// Rate limited; wait before trying again.
    RetryAfter(Duration),
}

/// Attempt budget and backoff for one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    /// Pause before retrying a rate-limited attempt.
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            rate_limit_backoff: Duration::from_secs(1),
        }
    }
}

/// Decide whether a failed attempt should be retried.
pub fn classify(err: &DisperseError, policy: &RetryPolicy) -> RetryDecision {
    match err {
        DisperseError::Status {
            code: StatusCode::InvalidArgument,
            ..
        } => RetryDecision::Abort,
        DisperseError::Status {
            code: StatusCode::ResourceExhausted,
            ..
        } => RetryDecision::RetryAfter(policy.rate_limit_backoff),
        DisperseError::Status { .. }
        | DisperseError::Transport(_)
        | DisperseError::Failed(_)
        | DisperseError::ConfirmationTimeout(_) => RetryDecision::RetryNow,
    }
}

/// Run `op` until it succeeds, the classifier aborts, or the budget runs out.
///
/// `op` receives the 1-based attempt number. Only the last error is
/// returned; earlier ones are logged.
pub async fn disperse_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, DaError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DisperseError>>,
{
    let budget = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "dispersal succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let decision = classify(&err, policy);
        if decision == RetryDecision::Abort || attempt >= budget {
            return Err(DaError::Dispersal {
                attempts: attempt,
                source: err,
            });
        }

        match decision {
            RetryDecision::RetryAfter(delay) => {
                warn!(attempt, budget, error = %err, backoff_ms = delay.as_millis() as u64, "dispersal rate limited, backing off");
                tokio::time::sleep(delay).await;
            }
            _ => {
                warn!(attempt, budget, error = %err, "dispersal attempt failed, retrying");
            }
        }
    }
}
