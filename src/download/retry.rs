//! Retry with exponential backoff for failed fetch attempts.
//!
//! A task is attempted up to [`RetryPolicy::max_attempts`] times. Attempts
//! run strictly one after another; between two attempts the worker sleeps
//! `base_delay * 2^i` where `i` is the zero-based index of the attempt that
//! just failed, so the delays are 1, 2, 4, ... units. No sleep follows the
//! final attempt.
//!
//! Every fetch error is retried regardless of its cause, including a fetch
//! program that could not be started.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use mediagrab_core::download::RetryPolicy;
//!
//! let policy = RetryPolicy::new(4, Duration::from_secs(1));
//! let delays: Vec<Duration> = policy.backoff_schedule().collect();
//! assert_eq!(
//!     delays,
//!     vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
//! );
//! ```

use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::{AttemptResult, CancellationFlag, Task, TaskOutcome};
use crate::fetch::Fetcher;
use crate::progress::StatusSink;

/// Default maximum attempts per task.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff unit (1 second).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Largest exponent applied to the base delay.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Reason recorded when cancellation stops a task before any attempt ran.
const CANCELLED_REASON: &str = "cancelled before any attempt";

/// Bounded retry with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 3
/// - `base_delay`: 1 second
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one. Never zero.
    max_attempts: u32,

    /// Delay before the first retry; doubles for each later retry.
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` below 1 is raised to 1 so a task is
    /// always attempted at least once.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Creates a policy with a custom `max_attempts` and the default delay.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, DEFAULT_BASE_DELAY)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay slept after the failed attempt with zero-based index `attempt_index`.
    ///
    /// Formula: `base_delay * 2^attempt_index`, exponent capped at 16.
    #[must_use]
    pub fn delay_for(&self, attempt_index: u32) -> Duration {
        let factor = 1u32 << attempt_index.min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(factor)
    }

    /// Delays slept by a task whose every attempt fails, in order.
    ///
    /// Yields `max_attempts - 1` strictly increasing values.
    pub fn backoff_schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts - 1).map(|index| self.delay_for(index))
    }
}

/// Runs `task` until it succeeds, fails fatally, or exhausts the policy.
///
/// Each attempt gets its own status line from `status`, ended as soon as the
/// attempt returns. When `cancel` is set, no further attempt starts and the
/// task fails with the last reason seen.
#[instrument(skip_all, fields(url = %task.url(), max_attempts = policy.max_attempts()))]
pub async fn attempt_with_retry(
    fetcher: &dyn Fetcher,
    task: &Task,
    policy: &RetryPolicy,
    status: &dyn StatusSink,
    cancel: &CancellationFlag,
) -> TaskOutcome {
    let mut last_reason = String::from(CANCELLED_REASON);
    let mut attempts = 0u32;

    for attempt_index in 0..policy.max_attempts() {
        if cancel.is_cancelled() {
            debug!(attempts, "cancellation requested, no further attempts");
            break;
        }

        attempts = attempt_index + 1;
        debug!(attempt = attempts, "attempting fetch");

        let reporter = status.begin(task.url());
        let result = AttemptResult::from(
            fetcher
                .fetch(task.url(), task.options(), reporter.as_ref())
                .await,
        );
        drop(reporter);

        match result {
            AttemptResult::Success => {
                return TaskOutcome::Downloaded {
                    url: task.url().to_string(),
                    attempts,
                };
            }
            AttemptResult::Fatal(reason) => {
                warn!(
                    url = %task.url(),
                    attempt = attempts,
                    error = %reason,
                    "attempt failed, not retrying"
                );
                return TaskOutcome::Failed {
                    url: task.url().to_string(),
                    reason,
                    attempts,
                };
            }
            AttemptResult::TransientFailure(reason) => {
                let has_next = attempts < policy.max_attempts();
                let delay = policy.delay_for(attempt_index);
                warn!(
                    url = %task.url(),
                    attempt = attempts,
                    max_attempts = policy.max_attempts(),
                    delay_ms = if has_next { delay.as_millis() } else { 0 },
                    error = %reason,
                    "attempt failed"
                );
                last_reason = reason;
                if has_next {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    TaskOutcome::Failed {
        url: task.url().to_string(),
        reason: last_reason,
        attempts,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::fetch::{FetchConfig, FetchError, MediaInfo, MediaMode};
    use crate::progress::{NullStatus, ProgressReporter};

    /// Fails the first `failures` fetches, then succeeds.
    struct FlakyFetcher {
        failures: u32,
        calls: AtomicU32,
        cancel_on_first_call: Option<CancellationFlag>,
    }

    impl FlakyFetcher {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                cancel_on_first_call: None,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FlakyFetcher {
        async fn probe(&self, _url: &str) -> Result<MediaInfo, FetchError> {
            Ok(MediaInfo::default())
        }

        async fn fetch(
            &self,
            url: &str,
            _config: &FetchConfig,
            _progress: &dyn ProgressReporter,
        ) -> Result<(), FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(flag) = &self.cancel_on_first_call {
                flag.cancel();
            }
            if call <= self.failures {
                Err(FetchError::exited(url, Some(1), &format!("failure {call}")))
            } else {
                Ok(())
            }
        }
    }

    struct MissingProgramFetcher;

    #[async_trait]
    impl Fetcher for MissingProgramFetcher {
        async fn probe(&self, _url: &str) -> Result<MediaInfo, FetchError> {
            Ok(MediaInfo::default())
        }

        async fn fetch(
            &self,
            _url: &str,
            _config: &FetchConfig,
            _progress: &dyn ProgressReporter,
        ) -> Result<(), FetchError> {
            let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
            Err(FetchError::spawn("yt-dlp", io))
        }
    }

    fn task(url: &str) -> Task {
        let options = Arc::new(FetchConfig::new(Path::new("out"), MediaMode::Video));
        Task::new(url, options)
    }

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.base_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_policy_zero_attempts_raised_to_one() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500));
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_exponent_is_capped() {
        let policy = RetryPolicy::new(100, Duration::from_millis(1));
        assert_eq!(policy.delay_for(40), policy.delay_for(MAX_BACKOFF_EXPONENT));
    }

    #[test]
    fn test_backoff_schedule_strictly_increasing() {
        let policy = RetryPolicy::new(6, Duration::from_secs(1));
        let delays: Vec<Duration> = policy.backoff_schedule().collect();
        assert_eq!(delays.len(), 5);
        assert!(delays.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(delays[4], Duration::from_secs(16));
    }

    #[test]
    fn test_backoff_schedule_single_attempt_is_empty() {
        let policy = RetryPolicy::with_max_attempts(1);
        assert_eq!(policy.backoff_schedule().count(), 0);
    }

    // ==================== attempt_with_retry Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_does_not_sleep() {
        let fetcher = FlakyFetcher::failing(0);
        let started = Instant::now();

        let outcome = attempt_with_retry(
            &fetcher,
            &task("u1"),
            &RetryPolicy::default(),
            &NullStatus,
            &CancellationFlag::new(),
        )
        .await;

        assert_eq!(
            outcome,
            TaskOutcome::Downloaded {
                url: "u1".to_string(),
                attempts: 1
            }
        );
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry_stops_attempting() {
        let fetcher = FlakyFetcher::failing(1);

        let outcome = attempt_with_retry(
            &fetcher,
            &task("u1"),
            &RetryPolicy::default(),
            &NullStatus,
            &CancellationFlag::new(),
        )
        .await;

        assert!(outcome.is_downloaded());
        assert_eq!(outcome.attempts(), 2);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_fail_sleeps_backoff_between_attempts() {
        let fetcher = FlakyFetcher::failing(u32::MAX);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let started = Instant::now();

        let outcome =
            attempt_with_retry(&fetcher, &task("u2"), &policy, &NullStatus, &CancellationFlag::new())
                .await;

        assert_eq!(fetcher.calls(), 3);
        match outcome {
            TaskOutcome::Failed {
                url,
                reason,
                attempts,
            } => {
                assert_eq!(url, "u2");
                assert_eq!(attempts, 3);
                assert!(reason.contains("failure 3"), "last reason kept: {reason}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        // 1s + 2s, nothing after the final attempt
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_failure_never_sleeps() {
        let fetcher = FlakyFetcher::failing(u32::MAX);
        let started = Instant::now();

        let outcome = attempt_with_retry(
            &fetcher,
            &task("u1"),
            &RetryPolicy::with_max_attempts(1),
            &NullStatus,
            &CancellationFlag::new(),
        )
        .await;

        assert!(!outcome.is_downloaded());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_program_is_retried_up_to_the_cap() {
        let started = Instant::now();
        let outcome = attempt_with_retry(
            &MissingProgramFetcher,
            &task("u1"),
            &RetryPolicy::new(3, Duration::from_secs(1)),
            &NullStatus,
            &CancellationFlag::new(),
        )
        .await;

        assert_eq!(outcome.attempts(), 3);
        assert!(matches!(outcome, TaskOutcome::Failed { reason, .. } if reason.contains("failed to start")));
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_further_attempts() {
        let flag = CancellationFlag::new();
        let fetcher = FlakyFetcher {
            cancel_on_first_call: Some(flag.clone()),
            ..FlakyFetcher::failing(u32::MAX)
        };

        let outcome =
            attempt_with_retry(&fetcher, &task("u1"), &RetryPolicy::default(), &NullStatus, &flag)
                .await;

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(outcome.attempts(), 1);
        assert!(matches!(outcome, TaskOutcome::Failed { reason, .. } if reason.contains("failure 1")));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_attempt() {
        let fetcher = FlakyFetcher::failing(0);
        let flag = CancellationFlag::new();
        flag.cancel();

        let outcome =
            attempt_with_retry(&fetcher, &task("u1"), &RetryPolicy::default(), &NullStatus, &flag)
                .await;

        assert_eq!(fetcher.calls(), 0);
        assert_eq!(outcome.attempts(), 0);
        assert!(matches!(outcome, TaskOutcome::Failed { reason, .. } if reason == CANCELLED_REASON));
    }

    #[test]
    fn test_default_max_retries_constant() {
        assert_eq!(DEFAULT_MAX_RETRIES, 3);
    }
}
