//! 网关进程入口：加载配置，启动设备服务、同步调度器与 HTTP 接口，收到退出信号后依次关停。

use std::path::PathBuf;
use std::sync::Arc;

use lis_config::{AppConfig, SyncConfig};
use lis_gateway::{
    AppState, LinkGenerator, StoreAnalyzerPort, build_router, spawn_device_reloader,
};
use lis_hl7::PipeCodec;
use lis_lifecycle::{DeviceServerManager, DeviceServerStrategy};
use lis_storage::{InMemoryResultStore, ResultStore};
use lis_sync::{
    HealthCircuit, HttpHealthChecker, ObservationResultSync, ResultLinkService, RetryPolicy,
    SchedulerConfig, SyncError, SyncJob, SyncScheduler, Upstream, UpstreamClient,
};
use lis_telemetry::init_tracing;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let devices = config.load_devices()?;
    let store: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());

    // 每台设备一个服务，报文经流水线写入结果存储
    let port = Arc::new(StoreAnalyzerPort::new(Arc::clone(&store)));
    let strategy = Arc::new(DeviceServerStrategy::new(Arc::new(PipeCodec::new()), port));
    let manager = Arc::new(DeviceServerManager::new(strategy, &devices).await);
    info!(target: "lis.lifecycle", devices = devices.len(), "device_servers_initialized");

    // 设备文件变更（或 SIGHUP）后重启受影响的设备服务
    let cancel = CancellationToken::new();
    let reloader = config.devices_file.as_ref().map(|path| {
        spawn_device_reloader(
            Arc::clone(&manager),
            PathBuf::from(path),
            config.devices_reload_interval(),
            cancel.clone(),
        )
    });

    let circuit = Arc::new(HealthCircuit::new());
    let (scheduler, links) = match &config.sync {
        Some(sync) => {
            let (scheduler, links) = start_sync(sync, Arc::clone(&store), Arc::clone(&circuit))?;
            (Some(scheduler), Some(links))
        }
        None => {
            info!(target: "lis.sync", "sync_disabled");
            (None, None)
        }
    };

    let app = build_router(AppState { circuit, links });
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "lis.http", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Some(reloader) = reloader {
        if let Err(err) = reloader.await {
            tracing::warn!(error = %err, "device_reloader_join_failed");
        }
    }
    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    manager.shutdown().await;
    info!("shutdown_complete");
    Ok(())
}

fn start_sync(
    sync: &SyncConfig,
    store: Arc<dyn ResultStore>,
    circuit: Arc<HealthCircuit>,
) -> Result<(SyncScheduler, Arc<dyn LinkGenerator>), SyncError> {
    let upstream = Arc::new(Upstream {
        base_url: sync.base_url.clone(),
        api_key: sync.api_key.clone(),
        lab_id: sync.lab_id.clone(),
    });
    let client = UpstreamClient::new(Arc::clone(&upstream), sync.http_timeout())?;
    let health = Arc::new(HttpHealthChecker::new(upstream, sync.health_timeout())?);

    let jobs: Vec<Arc<dyn SyncJob>> = vec![Arc::new(ObservationResultSync::new(
        store,
        client.clone(),
        sync.observation_interval(),
    ))];
    let scheduler = SyncScheduler::start(
        SchedulerConfig {
            queue_capacity: sync.queue_capacity,
            retry: RetryPolicy {
                max_attempts: sync.retry_max_attempts,
                delay: sync.retry_delay(),
            },
            job_deadline: sync.job_deadline(),
            health_interval: sync.health_interval(),
        },
        jobs,
        health,
        circuit,
    );
    let links: Arc<dyn LinkGenerator> = Arc::new(ResultLinkService::new(client));
    Ok((scheduler, links))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl_c_listener_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "sigterm_listener_failed");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown_signal_received");
}
