//! 同步任务接口与闭包任务。

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SyncError;

/// 周期性同步任务。
///
/// 调度器按 `interval` 入队，单次执行受截止时间与重试策略约束。
#[async_trait]
pub trait SyncJob: Send + Sync {
    fn name(&self) -> &str;

    fn interval(&self) -> Duration;

    async fn run(&self) -> Result<(), SyncError>;
}

/// 以闭包实现的任务，适合附加的轻量同步。
pub struct FnJob<F> {
    name: String,
    interval: Duration,
    run: F,
}

impl<F, Fut> FnJob<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SyncError>> + Send,
{
    pub fn new(name: impl Into<String>, interval: Duration, run: F) -> Self {
        Self {
            name: name.into(),
            interval,
            run,
        }
    }
}

#[async_trait]
impl<F, Fut> SyncJob for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SyncError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<(), SyncError> {
        (self.run)().await
    }
}
