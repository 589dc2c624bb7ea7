//! Bounded polling for conditions that settle over time.
//!
//! Used for rate-limited submissions and for cluster objects that converge
//! asynchronously. A condition reports one of three things per attempt:
//! done (`Ok(true)`), not yet (`Ok(false)`), or a terminal error (`Err`).
//!
//! # Example
//!
//! ```no_run
//! use common::poll::{poll_until, PollPolicy};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let policy = PollPolicy::new(Duration::from_millis(500), Duration::from_secs(10));
//! let result = poll_until(policy, || async { Ok::<_, std::io::Error>(true) }).await;
//! assert!(result.is_ok());
//! # }
//! ```

use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

/// Errors returned by [`poll_until`].
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// The condition never reported done before the timeout elapsed.
    #[error("Condition not met within {0:?}")]
    Timeout(Duration),

    /// The condition returned a terminal error.
    #[error(transparent)]
    Condition(E),
}

/// Interval and overall timeout for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between attempts.
    pub interval: Duration,

    /// Upper bound on the whole loop.
    pub timeout: Duration,

    /// Run the first attempt before sleeping.
    pub immediate: bool,
}

impl PollPolicy {
    /// Create a policy whose first attempt runs immediately.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            immediate: true,
        }
    }

    /// Sleep one interval before the first attempt.
    #[must_use]
    pub const fn delayed(mut self) -> Self {
        self.immediate = false;
        self
    }
}

/// Poll `condition` until it reports done, fails, or the timeout elapses.
///
/// No further attempts are made once the condition returns `Ok(true)` or
/// `Err(_)`.
///
/// # Errors
///
/// - `PollError::Condition` - the condition returned an error
/// - `PollError::Timeout` - the timeout elapsed first
pub async fn poll_until<F, Fut, E>(policy: PollPolicy, mut condition: F) -> Result<(), PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let start = Instant::now();

    if !policy.immediate {
        sleep(policy.interval.min(policy.timeout)).await;
    }

    loop {
        if condition().await.map_err(PollError::Condition)? {
            return Ok(());
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(PollError::Timeout(policy.timeout));
        }

        // Never sleep past the deadline
        let remaining = policy.timeout.saturating_sub(elapsed);
        sleep(policy.interval.min(remaining)).await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(5), Duration::from_millis(200))
    }

    #[test]
    fn test_policy_defaults_to_immediate() {
        let policy = PollPolicy::new(Duration::from_secs(5), Duration::from_secs(600));
        assert!(policy.immediate);
        assert!(!policy.delayed().immediate);
    }

    #[tokio::test]
    async fn test_poll_succeeds_immediately() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result = poll_until(fast_policy(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(true)
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_succeeds_after_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result = poll_until(fast_policy(), move || {
            let counter = counter.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, String>(count >= 3)
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_stops_on_first_error() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result = poll_until(fast_policy(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<bool, _>("boom".to_string())
            }
        })
        .await;

        assert!(matches!(result, Err(PollError::Condition(e)) if e == "boom"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let policy = PollPolicy::new(Duration::from_millis(5), Duration::from_millis(30));
        let result = poll_until(policy, || async { Ok::<_, String>(false) }).await;

        let err = result.expect_err("should time out");
        assert!(matches!(err, PollError::Timeout(d) if d == Duration::from_millis(30)));
        assert!(err.to_string().contains("not met within"));
    }

    #[tokio::test]
    async fn test_delayed_poll_still_runs_condition() {
        let policy = fast_policy().delayed();
        let result = poll_until(policy, || async { Ok::<_, String>(true) }).await;
        assert!(result.is_ok());
    }
}
