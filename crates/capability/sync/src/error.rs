//! 同步错误类型定义

use lis_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// 重试次数耗尽，`last` 为最后一次失败原因
    #[error("sync {name} failed after {attempts} retries")]
    RetriesExhausted {
        name: String,
        attempts: u32,
        last: String,
    },

    #[error("sync {name} exceeded deadline")]
    DeadlineExceeded { name: String },

    /// 关停时中断了重试等待
    #[error("sync {name} cancelled")]
    Cancelled { name: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Job(String),
}

impl SyncError {
    pub fn job(message: impl Into<String>) -> Self {
        Self::Job(message.into())
    }
}
