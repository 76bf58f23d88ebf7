//! Bounded polling for asynchronous jobs

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// Outcome of one poll attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Ready(T),
    Pending,
}

/// Hard iteration cap and constant delay between attempts
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(300))
    }
}

/// Call `operation` until it returns [`PollStatus::Ready`], at most `policy.max_attempts` times.
///
/// An error from `operation` is returned as-is on the attempt it happens. Running
/// out of attempts yields [`HarnessError::PollTimeout`].
pub async fn poll<T, F, Fut>(policy: PollPolicy, mut operation: F) -> HarnessResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = HarnessResult<PollStatus<T>>>,
{
    for attempt in 1..=policy.max_attempts {
        match operation(attempt).await? {
            PollStatus::Ready(value) => return Ok(value),
            PollStatus::Pending => {
                debug!(attempt, max = policy.max_attempts, "still pending");
                if attempt < policy.max_attempts {
                    sleep(policy.interval).await;
                }
            }
        }
    }

    Err(HarnessError::PollTimeout {
        attempts: policy.max_attempts,
        interval: policy.interval,
    })
}

/// Wait until `condition` holds, checking every `interval` for up to `timeout`
pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration, interval: Duration) -> HarnessResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return Ok(());
        }
        sleep(interval).await;
    }
    Err(HarnessError::Timeout {
        operation: "condition not met".to_string(),
        after: timeout,
    })
}
