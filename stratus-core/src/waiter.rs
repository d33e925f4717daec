//! Waiter - Poll a refresh function until a resource reaches a target state
//!
//! AWS reports most lifecycle changes asynchronously. Create, update and
//! delete handlers block on a `StateChangeConf` until the status string
//! returned by a Describe call lands in the target set.

use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::time::{Instant, sleep};

use crate::provider::{ProviderError, ProviderResult};

/// Default number of consecutive "not found" refreshes tolerated while waiting
/// for a non-empty target
pub const DEFAULT_NOT_FOUND_CHECKS: usize = 20;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Output of one refresh: `None` when the resource is not found, otherwise
/// the fetched object and its status string
pub type RefreshResult<T> = ProviderResult<Option<(T, String)>>;

/// Waiter failure
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})", expected.join(", "))]
    Timeout {
        last_state: String,
        expected: Vec<String>,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'", expected.join(", "))]
    UnexpectedState {
        state: String,
        expected: Vec<String>,
    },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: usize },

    #[error(transparent)]
    Refresh(#[from] ProviderError),
}

impl From<WaitError> for ProviderError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::Refresh(e) => e,
            other => ProviderError::new(other.to_string()).with_cause(other),
        }
    }
}

/// Poll configuration
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    /// Wait before the first refresh
    pub delay: Duration,
    pub timeout: Duration,
    /// Lower bound for the exponential backoff interval
    pub min_timeout: Duration,
    /// Fixed interval between refreshes; overrides the backoff when set
    pub poll_interval: Option<Duration>,
    pub not_found_checks: usize,
    /// Number of consecutive target observations required
    pub continuous_target_occurence: usize,
}

impl StateChangeConf {
    pub fn new(pending: &[&str], target: &[&str], timeout: Duration) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            timeout,
            min_timeout: Duration::ZERO,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurence: 1,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_not_found_checks(mut self, checks: usize) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn with_continuous_target_occurence(mut self, occurrences: usize) -> Self {
        self.continuous_target_occurence = occurrences.max(1);
        self
    }

    fn interval(&self, attempt: u32) -> Duration {
        if let Some(interval) = self.poll_interval {
            return interval;
        }
        let backoff = INITIAL_BACKOFF
            .saturating_mul(1u32 << attempt.min(16))
            .min(MAX_BACKOFF);
        backoff.max(self.min_timeout)
    }

    /// Poll `refresh` until the target state is reached
    ///
    /// Returns `Ok(None)` when the target set is empty and the resource is
    /// gone, otherwise the last object observed in a target state.
    pub async fn wait<T, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RefreshResult<T>>,
    {
        let start = Instant::now();
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let mut attempt: u32 = 0;
        let mut target_hits = 0;
        let mut not_found = 0;
        let mut last_state = String::new();

        loop {
            match refresh().await? {
                None => {
                    target_hits = 0;
                    if self.target.is_empty() {
                        return Ok(None);
                    }
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(WaitError::NotFound { checks: not_found });
                    }
                }
                Some((object, state)) => {
                    not_found = 0;
                    if self.target.contains(&state) {
                        target_hits += 1;
                        if target_hits >= self.continuous_target_occurence {
                            return Ok(Some(object));
                        }
                    } else if self.pending.contains(&state) {
                        target_hits = 0;
                    } else {
                        return Err(WaitError::UnexpectedState {
                            state,
                            expected: self.target.clone(),
                        });
                    }
                    last_state = state;
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(WaitError::Timeout {
                    last_state,
                    expected: self.target.clone(),
                    timeout: self.timeout,
                });
            }

            let interval = self.interval(attempt).min(self.timeout - elapsed);
            debug!(
                "waiting {:?} for state {:?} (last: '{}')",
                interval, self.target, last_state
            );
            attempt = attempt.saturating_add(1);
            sleep(interval).await;
        }
    }
}

/// Re-invoke `op` while its error is retryable, until `timeout` elapses
///
/// Used for eventual-consistency errors such as a freshly created IAM role
/// not yet being assumable by the calling service.
pub async fn retry_when<T, E, F, Fut, R>(
    timeout: Duration,
    interval: Duration,
    mut op: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let start = Instant::now();
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && start.elapsed() + interval < timeout => {
                debug!("retrying after retryable error: {}", e);
                sleep(interval).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(pending: &[&str], target: &[&str]) -> StateChangeConf {
        StateChangeConf::new(pending, target, Duration::from_secs(2))
            .with_poll_interval(Duration::from_millis(1))
    }

    /// Refresh function yielding a scripted sequence of states
    fn scripted(
        states: Vec<Option<&'static str>>,
    ) -> (Arc<AtomicUsize>, impl FnMut() -> std::future::Ready<RefreshResult<usize>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let refresh = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let state = states[n.min(states.len() - 1)];
            std::future::ready(Ok(state.map(|s| (n, s.to_string()))))
        };
        (calls, refresh)
    }

    #[tokio::test]
    async fn reaches_target_after_pending() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (calls, refresh) = scripted(vec![Some("creating"), Some("creating"), Some("available")]);
        let result = fast(&["creating"], &["available"]).wait(refresh).await.unwrap();
        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_with_empty_target_means_deleted() {
        let (_, refresh) = scripted(vec![Some("deleting"), None]);
        let result = fast(&["deleting"], &[]).wait(refresh).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn unexpected_state_is_an_error() {
        let (_, refresh) = scripted(vec![Some("creating"), Some("error")]);
        let err = fast(&["creating"], &["available"]).wait(refresh).await.unwrap_err();
        match err {
            WaitError::UnexpectedState { state, .. } => assert_eq!(state, "error"),
            other => panic!("Expected UnexpectedState, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn not_found_checks_are_bounded() {
        let (calls, refresh) = scripted(vec![None]);
        let err = fast(&["creating"], &["available"])
            .with_not_found_checks(3)
            .wait(refresh)
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::NotFound { checks: 4 }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn not_found_then_found_resets_counter() {
        let (_, refresh) = scripted(vec![None, None, Some("OFFLINE"), None, None, Some("ONLINE")]);
        let result = fast(&["OFFLINE"], &["ONLINE"])
            .with_not_found_checks(2)
            .wait(refresh)
            .await
            .unwrap();
        assert_eq!(result, Some(5));
    }

    #[tokio::test]
    async fn continuous_target_occurence_requires_consecutive_hits() {
        let (calls, refresh) = scripted(vec![
            Some("active"),
            Some("modifying"),
            Some("active"),
            Some("active"),
        ]);
        let result = fast(&["modifying"], &["active"])
            .with_continuous_target_occurence(2)
            .wait(refresh)
            .await
            .unwrap();
        assert_eq!(result, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn times_out_with_last_state() {
        let (_, refresh) = scripted(vec![Some("CREATING")]);
        let err = StateChangeConf::new(&["CREATING"], &["AVAILABLE"], Duration::from_millis(30))
            .with_poll_interval(Duration::from_millis(5))
            .wait(refresh)
            .await
            .unwrap_err();
        match err {
            WaitError::Timeout { last_state, .. } => assert_eq!(last_state, "CREATING"),
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn refresh_error_is_propagated() {
        let err = fast(&["creating"], &["available"])
            .wait(|| std::future::ready(Err::<Option<((), String)>, _>(ProviderError::new("denied"))))
            .await
            .unwrap_err();
        let provider_err: ProviderError = err.into();
        assert_eq!(provider_err.message, "denied");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let conf = StateChangeConf::new(&[], &["x"], Duration::from_secs(60));
        assert_eq!(conf.interval(0), Duration::from_millis(100));
        assert_eq!(conf.interval(1), Duration::from_millis(200));
        assert_eq!(conf.interval(10), MAX_BACKOFF);

        let floored = conf.with_min_timeout(Duration::from_secs(1));
        assert_eq!(floored.interval(0), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn retry_when_retries_only_retryable_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<&str, String> = retry_when(
            Duration::from_secs(1),
            Duration::from_millis(1),
            || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(if n < 2 {
                    Err("role not assumable".to_string())
                } else {
                    Ok("done")
                })
            },
            |e: &String| e.contains("not assumable"),
        )
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let result: Result<(), String> = retry_when(
            Duration::from_secs(1),
            Duration::from_millis(1),
            || std::future::ready(Err("access denied".to_string())),
            |e: &String| e.contains("not assumable"),
        )
        .await;
        assert_eq!(result, Err("access denied".to_string()));
    }
}
