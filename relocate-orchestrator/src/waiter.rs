use anyhow::anyhow;
use relocate_common::{MigrationError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Fixed-interval polling bounded by an overall timeout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// One policy per asynchronous operation of a migration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Waits {
    pub stop: WaitPolicy,
    pub image: WaitPolicy,
    pub copy: WaitPolicy,
    pub launch: WaitPolicy,
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_COPY_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(15 * 60);

impl Default for Waits {
    fn default() -> Self {
        Self {
            stop: WaitPolicy::new(DEFAULT_POLL_INTERVAL, DEFAULT_STOP_TIMEOUT),
            image: WaitPolicy::new(DEFAULT_POLL_INTERVAL, DEFAULT_IMAGE_TIMEOUT),
            copy: WaitPolicy::new(DEFAULT_POLL_INTERVAL, DEFAULT_COPY_TIMEOUT),
            launch: WaitPolicy::new(DEFAULT_POLL_INTERVAL, DEFAULT_LAUNCH_TIMEOUT),
        }
    }
}

impl Waits {
    /// Same policy for every operation.
    pub fn uniform(interval: Duration, timeout: Duration) -> Self {
        let policy = WaitPolicy::new(interval, timeout);
        Self {
            stop: policy,
            image: policy,
            copy: policy,
            launch: policy,
        }
    }
}

/// What a single poll observed.
#[derive(Debug)]
pub enum Probe<T> {
    Ready(T),
    /// Still in progress; carries the observed state for logging.
    Pending(String),
    /// Settled into a state that will never become ready.
    Failed(String),
}

/// Poll `probe` until it reports `Ready`.
///
/// - `Pending` sleeps one interval and polls again
/// - `Failed` aborts with a provider error naming the observed state
/// - a probe error aborts immediately (the request itself was rejected)
/// - once `policy.timeout` has elapsed, aborts with `OperationTimeout`
pub async fn wait_until<T, F, Fut>(
    operation: &'static str,
    resource: &str,
    policy: WaitPolicy,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>>>,
{
    let start = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match probe().await? {
            Probe::Ready(value) => {
                debug!(
                    operation,
                    resource,
                    attempt,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "wait complete"
                );
                return Ok(value);
            }
            Probe::Failed(observed) => {
                return Err(MigrationError::Provider(anyhow!(
                    "{} on {} ended in state '{}'",
                    operation,
                    resource,
                    observed
                )));
            }
            Probe::Pending(observed) => {
                debug!(operation, resource, attempt, observed = %observed, "still waiting");
            }
        }

        if start.elapsed() >= policy.timeout {
            return Err(MigrationError::OperationTimeout {
                operation,
                resource: resource.to_string(),
                waited_ms: start.elapsed().as_millis() as u64,
            });
        }
        sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast(timeout_ms: u64) -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(1), Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn returns_once_ready() {
        let polls = Cell::new(0u32);
        let value = wait_until("image_available", "ami-1", fast(1_000), || {
            polls.set(polls.get() + 1);
            let n = polls.get();
            async move {
                if n < 3 {
                    Ok(Probe::Pending("pending".to_string()))
                } else {
                    Ok(Probe::Ready(n))
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn times_out_with_operation_timeout() {
        let err = wait_until::<(), _, _>("instance_stopped", "i-1", fast(20), || async {
            Ok(Probe::Pending("stopping".to_string()))
        })
        .await
        .unwrap_err();
        let message = err.to_string();
        match err {
            MigrationError::OperationTimeout {
                operation,
                resource,
                waited_ms,
            } => {
                assert_eq!(operation, "instance_stopped");
                assert_eq!(resource, "i-1");
                assert!(waited_ms >= 20);
                assert_eq!(
                    message,
                    format!("timed out after {waited_ms}ms waiting for instance_stopped on i-1")
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_state_aborts_without_waiting_for_timeout() {
        let polls = Cell::new(0u32);
        let err = wait_until::<(), _, _>("image_available", "ami-1", fast(60_000), || {
            polls.set(polls.get() + 1);
            async { Ok(Probe::Failed("failed".to_string())) }
        })
        .await
        .unwrap_err();
        assert_eq!(polls.get(), 1);
        assert_eq!(err.kind(), "provider");
        assert!(err.to_string().contains("ended in state 'failed'"));
    }

    #[tokio::test]
    async fn probe_errors_propagate() {
        let err = wait_until::<(), _, _>("image_available", "ami-1", fast(60_000), || async {
            Err(MigrationError::Provider(anyhow!("AuthFailure")))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "AuthFailure");
    }

    #[test]
    fn default_policies_poll_every_fifteen_seconds() {
        let waits = Waits::default();
        for policy in [waits.stop, waits.image, waits.copy, waits.launch] {
            assert_eq!(policy.interval, DEFAULT_POLL_INTERVAL);
            assert!(policy.timeout > policy.interval);
        }
        assert_eq!(waits.copy.timeout, Duration::from_secs(3600));
    }
}
