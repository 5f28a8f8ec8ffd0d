//! 设备列表热加载
//!
//! 周期性或收到 SIGHUP 时重读设备文件，交给 `DeviceServerManager::restart_all` 对齐：
//! 端口 / 型号 / 波特率变化的设备重启，已停止的服务重新拉起，文件中删除的设备被移除。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use domain::DeviceId;
use lis_config::ConfigError;
use lis_lifecycle::{DeviceServerManager, LifecycleError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 重读设备文件并对齐运行中的设备服务。
///
/// 文件读取或解析失败时不改动任何服务；返回启动失败的设备。
pub async fn reload_devices(
    manager: &DeviceServerManager,
    path: &Path,
) -> Result<Vec<(DeviceId, LifecycleError)>, ConfigError> {
    let devices = lis_config::load_devices(path)?;
    let failures = manager.restart_all(&devices).await;
    info!(
        target: "lis.lifecycle",
        devices = devices.len(),
        failed = failures.len(),
        "devices_reloaded"
    );
    Ok(failures)
}

/// 启动热加载任务，`cancel` 触发后退出。
pub fn spawn_device_reloader(
    manager: Arc<DeviceServerManager>,
    path: PathBuf,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut hangup = HangupListener::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = hangup.recv() => {
                    info!(target: "lis.lifecycle", "reload_signal_received");
                }
            }
            if let Err(err) = reload_devices(&manager, &path).await {
                warn!(target: "lis.lifecycle", error = %err, "devices_reload_failed");
            }
        }
        info!(target: "lis.lifecycle", "device_reloader_stopped");
    })
}

struct HangupListener {
    #[cfg(unix)]
    signal: Option<tokio::signal::unix::Signal>,
}

impl HangupListener {
    #[cfg(unix)]
    fn new() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::hangup()) {
            Ok(signal) => Self {
                signal: Some(signal),
            },
            Err(err) => {
                warn!(target: "lis.lifecycle", error = %err, "sighup_listener_failed");
                Self { signal: None }
            }
        }
    }

    #[cfg(not(unix))]
    fn new() -> Self {
        Self {}
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        if let Some(signal) = self.signal.as_mut() {
            if signal.recv().await.is_some() {
                return;
            }
        }
        std::future::pending::<()>().await
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}
