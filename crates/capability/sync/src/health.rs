//! 上游健康检查。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::upstream::{Upstream, UpstreamClient, ensure_success};

/// 健康检查默认超时
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self) -> Result<(), SyncError>;
}

/// `GET {base}/ping`，仅 200 视为健康。
pub struct HttpHealthChecker {
    client: UpstreamClient,
}

impl HttpHealthChecker {
    pub fn new(upstream: Arc<Upstream>, timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self {
            client: UpstreamClient::new(upstream, timeout)?,
        })
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self) -> Result<(), SyncError> {
        let response = ensure_success(self.client.get("/ping").send().await?).await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(SyncError::Status {
                status: response.status().as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}
