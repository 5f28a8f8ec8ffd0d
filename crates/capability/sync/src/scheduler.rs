//! 同步调度器
//!
//! ```text
//! ticker(job A) ─┐
//! ticker(job B) ─┼─ try_send ─▶ mpsc(10) ─▶ worker（串行执行，截止时间 + 重试）
//! ticker(job C) ─┘      ▲
//!                       │ 熔断断开时不入队
//! health monitor ──▶ HealthCircuit
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::circuit::HealthCircuit;
use crate::error::SyncError;
use crate::health::HealthChecker;
use crate::job::SyncJob;
use crate::retry::{RetryPolicy, retry};

/// 调度器参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
    /// 单次任务（含全部重试）的截止时间
    pub job_deadline: Duration,
    pub health_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            retry: RetryPolicy::default(),
            job_deadline: Duration::from_secs(120),
            health_interval: Duration::from_secs(10),
        }
    }
}

type Queue = mpsc::Sender<Arc<dyn SyncJob>>;

/// 运行中的同步调度器。
pub struct SyncScheduler {
    circuit: Arc<HealthCircuit>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    worker: JoinHandle<()>,
}

impl SyncScheduler {
    /// 启动每个任务的 ticker、健康监视器与唯一的 worker。
    pub fn start(
        config: SchedulerConfig,
        jobs: Vec<Arc<dyn SyncJob>>,
        health: Arc<dyn HealthChecker>,
        circuit: Arc<HealthCircuit>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));

        let mut tasks = Vec::with_capacity(jobs.len() + 1);
        for job in jobs {
            info!(target: "lis.sync", job = job.name(), interval_ms = job.interval().as_millis() as u64, "sync_job_scheduled");
            tasks.push(tokio::spawn(run_ticker(
                job,
                tx.clone(),
                Arc::clone(&circuit),
                cancel.clone(),
            )));
        }
        tasks.push(tokio::spawn(run_health_monitor(
            health,
            Arc::clone(&circuit),
            config.health_interval,
            cancel.clone(),
        )));
        // 队列只由 ticker 持有发送端，ticker 全部退出后 worker 排空即结束
        drop(tx);

        let worker = tokio::spawn(run_worker(rx, config, cancel.clone()));
        info!(target: "lis.sync", queue_capacity = config.queue_capacity, "sync_scheduler_started");

        Self {
            circuit,
            cancel,
            tasks,
            worker,
        }
    }

    pub fn circuit(&self) -> Arc<HealthCircuit> {
        Arc::clone(&self.circuit)
    }

    /// 停止 ticker 与健康监视器，等待 worker 执行完已入队的任务。
    ///
    /// 正在等待重试的任务立即以 `Cancelled` 结束。
    pub async fn shutdown(self) {
        info!(target: "lis.sync", "sync_scheduler_stopping");
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                warn!(target: "lis.sync", error = %err, "sync_task_join_failed");
            }
        }
        if let Err(err) = self.worker.await {
            warn!(target: "lis.sync", error = %err, "sync_worker_join_failed");
        }
        info!(target: "lis.sync", "sync_scheduler_stopped");
    }
}

/// 执行一次任务：截止时间内按策略重试。
pub async fn execute_job(
    job: &dyn SyncJob,
    policy: &RetryPolicy,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<(), SyncError> {
    let name = job.name().to_string();
    info!(target: "lis.sync", job = %name, "sync_started");
    let started = Instant::now();

    let outcome = match tokio::time::timeout(deadline, retry(&name, policy, cancel, || job.run()))
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => Err(SyncError::DeadlineExceeded { name: name.clone() }),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        Ok(()) => {
            lis_telemetry::record_sync_success();
            info!(target: "lis.sync", job = %name, elapsed_ms, "sync_succeeded");
        }
        Err(err) => {
            lis_telemetry::record_sync_failure();
            error!(target: "lis.sync", job = %name, elapsed_ms, error = %err, "sync_failed");
        }
    }
    outcome
}

async fn run_ticker(
    job: Arc<dyn SyncJob>,
    queue: Queue,
    circuit: Arc<HealthCircuit>,
    cancel: CancellationToken,
) {
    let period = job.interval().max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if !circuit.is_active() {
            debug!(target: "lis.sync", job = job.name(), "sync_tick_skipped_circuit_open");
            continue;
        }
        match queue.try_send(Arc::clone(&job)) {
            Ok(()) => debug!(target: "lis.sync", job = job.name(), "sync_enqueued"),
            Err(TrySendError::Full(_)) => {
                lis_telemetry::record_sync_tick_dropped();
                warn!(target: "lis.sync", job = job.name(), "sync_queue_full_tick_dropped");
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }
    debug!(target: "lis.sync", job = job.name(), "sync_ticker_stopped");
}

async fn run_worker(
    mut queue: mpsc::Receiver<Arc<dyn SyncJob>>,
    config: SchedulerConfig,
    cancel: CancellationToken,
) {
    while let Some(job) = queue.recv().await {
        // 错误已在 execute_job 中记录，不重新入队
        let _ = execute_job(job.as_ref(), &config.retry, config.job_deadline, &cancel).await;
    }
    info!(target: "lis.sync", "sync_worker_stopped");
}

async fn run_health_monitor(
    health: Arc<dyn HealthChecker>,
    circuit: Arc<HealthCircuit>,
    period: Duration,
    cancel: CancellationToken,
) {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let checked = tokio::select! {
            _ = cancel.cancelled() => break,
            checked = health.check() => checked,
        };
        match checked {
            Ok(()) => circuit.record_success(),
            Err(err) => {
                lis_telemetry::record_health_failure();
                circuit.record_failure(&err.to_string());
            }
        }
    }
    debug!(target: "lis.sync", "health_monitor_stopped");
}
