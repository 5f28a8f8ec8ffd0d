//! 固定间隔重试。

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::SyncError;

/// 重试策略：最多 `max_attempts` 次，每次失败后等待 `delay`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(1),
        }
    }
}

/// 执行 `operation` 直到成功或次数耗尽。
///
/// 首次成功立即返回；最后一次失败后不再等待。
/// `cancel` 触发时中断等待并返回 `SyncError::Cancelled`。
pub async fn retry<F, Fut, T>(
    name: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(target: "lis.sync", job = name, attempt, "sync_succeeded_after_retry");
                }
                return Ok(value);
            }
            Err(err) if attempt >= max_attempts => {
                warn!(target: "lis.sync", job = name, attempt, error = %err, "sync_final_attempt_failed");
                return Err(SyncError::RetriesExhausted {
                    name: name.to_string(),
                    attempts: attempt,
                    last: err.to_string(),
                });
            }
            Err(err) => {
                warn!(
                    target: "lis.sync",
                    job = name,
                    attempt,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "sync_attempt_failed"
                );
                lis_telemetry::record_sync_retry();
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(SyncError::Cancelled { name: name.to_string() });
                    }
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn first_success_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let started = tokio::time::Instant::now();
        let value = retry("op", &RetryPolicy::default(), &CancellationToken::new(), || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, SyncError>(7)
            }
        })
        .await
        .expect("success");
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::from_secs(1),
        };
        let err = retry("op", &policy, &CancellationToken::new(), || async {
            Err::<(), _>(SyncError::job("down"))
        })
        .await
        .expect_err("fails");
        assert!(matches!(err, SyncError::RetriesExhausted { attempts: 1, .. }));
    }
}
