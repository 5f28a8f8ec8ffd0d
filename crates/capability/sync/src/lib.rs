//! # 外发同步能力模块
//!
//! - **SyncScheduler**：每个任务一个 ticker，有界队列，单 worker 串行执行
//! - **retry**：固定间隔重试（默认 10 次，间隔 1 秒），关停时中断等待
//! - **HealthCircuit**：健康检查一次失败即暂停入队，成功即恢复
//! - **ObservationResultSync**：待同步结果按标本外发，只标记成功的标本
//! - **ResultLinkService**：申请结果公开链接

mod circuit;
mod error;
mod health;
mod job;
mod link;
mod observation;
mod retry;
mod scheduler;
mod upstream;

pub use circuit::{CircuitState, HealthCircuit};
pub use error::SyncError;
pub use health::{HEALTH_TIMEOUT, HealthChecker, HttpHealthChecker};
pub use job::{FnJob, SyncJob};
pub use link::ResultLinkService;
pub use observation::{OBSERVATION_RESULT_JOB, ObservationResultSync};
pub use retry::{RetryPolicy, retry};
pub use scheduler::{SchedulerConfig, SyncScheduler, execute_job};
pub use upstream::{API_KEY_HEADER, Upstream, UpstreamClient};
