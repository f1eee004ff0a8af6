//! Retry controller: exponential backoff with jitter around a single-attempt
//! operation.
//!
//! Per attempt the controller moves `Attempting → Success | RetryScheduled |
//! Failed`:
//! - success returns immediately;
//! - a retryable failure with budget left sleeps
//!   `base_delay * 2^attempt + jitter` and attempts again;
//! - a retryable failure on the last attempt, or any non-retryable failure,
//!   ends with `AnalysisError::Transport`.
//!
//! `RetryState` is created per call and never outlives it.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::transport::TransportFailure;
use super::AnalysisError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY_MS: u64 = 1000;
const MAX_JITTER_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform random delay added to each backoff.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_jitter: Duration::from_millis(MAX_JITTER_MS),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Fail,
}

#[derive(Debug, Clone)]
pub struct RetryState {
    /// Zero-based index of the attempt in flight.
    pub attempt: u32,
    policy: RetryPolicy,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { attempt: 0, policy }
    }

    /// Attempts started so far, counting the one in flight.
    pub fn attempts_made(&self) -> u32 {
        self.attempt + 1
    }

    /// Records a failed attempt and decides the next transition.
    pub fn on_failure(&mut self, failure: &TransportFailure) -> RetryDecision {
        if !failure.is_retryable() || self.attempts_made() >= self.policy.max_attempts {
            return RetryDecision::Fail;
        }
        let delay = self.backoff_delay() + jitter(self.policy.max_jitter);
        self.attempt += 1;
        RetryDecision::RetryAfter(delay)
    }

    /// The deterministic part of the next delay: `base_delay * 2^attempt`.
    pub fn backoff_delay(&self) -> Duration {
        self.policy
            .base_delay
            .saturating_mul(2u32.saturating_pow(self.attempt))
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// Runs `op` until it succeeds, fails fatally, or the attempt budget is spent.
///
/// `op` receives the zero-based attempt index. Cancelling `cancel` drops the
/// in-flight attempt and any pending backoff sleep.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, AnalysisError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportFailure>>,
{
    let mut state = RetryState::new(policy);

    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
            outcome = op(state.attempt) => outcome,
        };

        let failure = match outcome {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        match state.on_failure(&failure) {
            RetryDecision::RetryAfter(delay) => {
                warn!(
                    "LLM call attempt {}/{} {} ({}), retrying after {}ms...",
                    state.attempt,
                    policy.max_attempts,
                    if failure.is_timeout() { "timed out" } else { "failed" },
                    failure,
                    delay.as_millis()
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AnalysisError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            RetryDecision::Fail => {
                return Err(AnalysisError::Transport {
                    status: failure.status(),
                    message: failure.message().to_string(),
                    attempts: state.attempts_made(),
                    timed_out: failure.is_timeout(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn status(code: u16) -> TransportFailure {
        TransportFailure::Status {
            status: code,
            message: format!("status {code}"),
        }
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let mut state = RetryState::new(RetryPolicy::default());
        assert_eq!(state.backoff_delay(), Duration::from_millis(1000));
        state.attempt = 1;
        assert_eq!(state.backoff_delay(), Duration::from_millis(2000));
        state.attempt = 2;
        assert_eq!(state.backoff_delay(), Duration::from_millis(4000));
    }

    #[test]
    fn test_retryable_failure_schedules_jittered_delay() {
        let mut state = RetryState::new(RetryPolicy::default());

        match state.on_failure(&status(503)) {
            RetryDecision::RetryAfter(d) => {
                assert!(d >= Duration::from_millis(1000) && d < Duration::from_millis(2000));
            }
            RetryDecision::Fail => panic!("first 503 should be retried"),
        }
        match state.on_failure(&status(429)) {
            RetryDecision::RetryAfter(d) => {
                assert!(d >= Duration::from_millis(2000) && d < Duration::from_millis(3000));
            }
            RetryDecision::Fail => panic!("second 429 should be retried"),
        }
        assert_eq!(state.on_failure(&status(500)), RetryDecision::Fail);
        assert_eq!(state.attempts_made(), 3);
    }

    #[test]
    fn test_fatal_failure_fails_immediately() {
        let mut state = RetryState::new(RetryPolicy::default());
        assert_eq!(state.on_failure(&status(401)), RetryDecision::Fail);
        assert_eq!(state.attempts_made(), 1);
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let policy = RetryPolicy {
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let mut state = RetryState::new(policy);
        assert_eq!(
            state.on_failure(&status(500)),
            RetryDecision::RetryAfter(Duration::from_millis(1000))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let result = retry_with_backoff(RetryPolicy::default(), &cancel, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(status(500))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(3000), "waited {waited:?}");
        assert!(waited < Duration::from_millis(5000), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_stops_at_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> =
            retry_with_backoff(RetryPolicy::default(), &CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(status(503)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(AnalysisError::Transport {
                status, attempts, ..
            }) => {
                assert_eq!(status, Some(503));
                assert_eq!(attempts, 3);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_timeouts_are_reported_as_timeouts() {
        let result: Result<(), _> =
            retry_with_backoff(RetryPolicy::default(), &CancellationToken::new(), |_| async {
                Err(TransportFailure::Network {
                    message: "operation timed out".to_string(),
                    timed_out: true,
                })
            })
            .await;

        match result {
            Err(AnalysisError::Transport {
                status: None,
                attempts: 3,
                timed_out,
                ..
            }) => assert!(timed_out),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = retry_with_backoff(RetryPolicy::default(), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status(500)) }
        })
        .await;

        assert!(matches!(result, Err(AnalysisError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_skips_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff(RetryPolicy::default(), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert!(matches!(result, Err(AnalysisError::Cancelled)));
        // op() is called to build the future, but the future is never polled.
        assert!(calls.load(Ordering::SeqCst) <= 1);
    }
}
