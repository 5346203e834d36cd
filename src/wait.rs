//! Polling primitives for remote state that only becomes visible eventually.
//!
//! GitHub never pushes run or branch state to this client, so every wait is a
//! check called at a fixed interval until it yields a value or the deadline
//! passes. Dropping the returned future cancels the wait; nothing remote is
//! cancelled with it.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::github::GitHubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitOptions {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn seconds(timeout_secs: u64) -> Self {
        Self::new(Duration::from_secs(timeout_secs), Self::DEFAULT_INTERVAL)
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::seconds(60)
    }
}

/// Call `check` every `options.interval` until it returns `Some`.
///
/// A check error ends the wait immediately; checks that want to tolerate
/// transient failures should map them to `Ok(None)`. When the timeout elapses
/// first the result is `GitHubError::Timeout` naming `operation`.
pub async fn wait_for<T, F, Fut>(
    operation: &str,
    options: WaitOptions,
    mut check: F,
) -> Result<T, GitHubError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, GitHubError>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;
    let polling = async {
        loop {
            attempts += 1;
            if let Some(found) = check().await? {
                return Ok(found);
            }
            tokio::time::sleep(options.interval).await;
        }
    };

    let outcome = tokio::time::timeout(options.timeout, polling).await;
    match outcome {
        Ok(result) => {
            debug!(operation, attempts, elapsed_ms = started.elapsed().as_millis() as u64, "Wait finished");
            result
        }
        Err(_) => Err(GitHubError::Timeout {
            operation: operation.to_string(),
            duration_ms: options.timeout.as_millis() as u64,
        }),
    }
}

/// Fixed number of checks, `interval` apart; `None` when every check missed.
pub async fn poll_attempts<T, F, Fut>(
    attempts: u32,
    interval: Duration,
    mut check: F,
) -> Result<Option<T>, GitHubError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, GitHubError>>,
{
    for _ in 0..attempts {
        if let Some(found) = check().await? {
            return Ok(Some(found));
        }
        tokio::time::sleep(interval).await;
    }
    Ok(None)
}
