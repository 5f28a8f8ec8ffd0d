//! 设备服务表：启动、热重启、停止与状态查询。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use domain::{Device, DeviceId, ServerState};
use lis_protocol::{DeviceServer, DummyServer};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::LifecycleError;
use crate::strategy::ServerStrategy;

struct ServerEntry {
    device: Device,
    server: Arc<dyn DeviceServer>,
}

impl ServerEntry {
    /// 服务已停止，或配置快照的端口 / 型号 / 波特率发生变化。
    fn needs_restart(&self, device: &Device) -> bool {
        self.server.state() == ServerState::Stopped
            || self.device.receive_port != device.receive_port
            || self.device.device_type != device.device_type
            || self.device.baud_rate != device.baud_rate
    }
}

/// 设备服务生命周期管理器。
///
/// 所有操作由同一把异步锁串行化。
pub struct DeviceServerManager {
    strategy: Arc<dyn ServerStrategy>,
    servers: Mutex<HashMap<DeviceId, ServerEntry>>,
}

impl DeviceServerManager {
    /// 创建管理器并逐台启动；单台失败只记录日志。
    pub async fn new(strategy: Arc<dyn ServerStrategy>, devices: &[Device]) -> Self {
        let manager = Self {
            strategy,
            servers: Mutex::new(HashMap::new()),
        };
        for device in devices {
            if let Err(err) = manager.start_new_server(device.clone()).await {
                error!(target: "lis.lifecycle", device_id = device.id, error = %err, "device_server_start_failed");
            }
        }
        manager
    }

    /// 启动或复用设备服务。
    ///
    /// 已存在且无需重启时原样返回；不支持的型号安装 `DummyServer`；
    /// 启动失败时设备不在表中。
    pub async fn start_new_server(
        &self,
        device: Device,
    ) -> Result<Arc<dyn DeviceServer>, LifecycleError> {
        let mut servers = self.servers.lock().await;

        if let Some(entry) = servers.get(&device.id) {
            if !entry.needs_restart(&device) {
                return Ok(Arc::clone(&entry.server));
            }
            info!(
                target: "lis.lifecycle",
                device_id = device.id,
                old_port = %entry.device.receive_port,
                new_port = %device.receive_port,
                state = %entry.server.state(),
                "device_server_restarting"
            );
            if let Err(err) = entry.server.stop().await {
                warn!(target: "lis.lifecycle", device_id = device.id, error = %err, "device_server_stop_failed");
            }
            servers.remove(&device.id);
        }

        let server = match self.strategy.choose_device_server(&device) {
            Ok(server) => server,
            Err(LifecycleError::DeviceTypeNotSupported(device_type)) => {
                info!(target: "lis.lifecycle", device_id = device.id, device_type = %device_type, "dummy_server_installed");
                let dummy: Arc<dyn DeviceServer> = Arc::new(DummyServer::new(device.id));
                servers.insert(
                    device.id,
                    ServerEntry {
                        device,
                        server: Arc::clone(&dummy),
                    },
                );
                return Ok(dummy);
            }
            Err(err) => return Err(err),
        };

        let device_id = device.id;
        let started = async {
            server.start().await?;
            server.serve()
        }
        .await;
        started.map_err(|source| LifecycleError::Start { device_id, source })?;

        info!(
            target: "lis.lifecycle",
            device_id,
            device_type = %device.device_type,
            port = %device.receive_port,
            "device_server_started"
        );
        servers.insert(
            device_id,
            ServerEntry {
                device,
                server: Arc::clone(&server),
            },
        );
        Ok(server)
    }

    pub async fn get_all_server_state(&self) -> HashMap<DeviceId, ServerState> {
        let servers = self.servers.lock().await;
        servers
            .iter()
            .map(|(id, entry)| (*id, entry.server.state()))
            .collect()
    }

    /// 未登记的设备视为 `Stopped`。
    pub async fn get_server_state_by_device_id(&self, device_id: DeviceId) -> ServerState {
        let servers = self.servers.lock().await;
        servers
            .get(&device_id)
            .map(|entry| entry.server.state())
            .unwrap_or(ServerState::Stopped)
    }

    /// 停止但保留登记，下次 `start_new_server` 会重启。
    pub async fn stop_server_by_device_id(
        &self,
        device_id: DeviceId,
    ) -> Result<(), LifecycleError> {
        let servers = self.servers.lock().await;
        let entry = servers
            .get(&device_id)
            .ok_or(LifecycleError::NotFound(device_id))?;
        entry
            .server
            .stop()
            .await
            .map_err(|source| LifecycleError::Stop { device_id, source })?;
        info!(target: "lis.lifecycle", device_id, "device_server_stopped");
        Ok(())
    }

    /// 停止并移除；停止失败只记录日志。
    pub async fn delete_server_by_device_id(
        &self,
        device_id: DeviceId,
    ) -> Result<(), LifecycleError> {
        let mut servers = self.servers.lock().await;
        let entry = servers
            .remove(&device_id)
            .ok_or(LifecycleError::NotFound(device_id))?;
        if let Err(err) = entry.server.stop().await {
            warn!(target: "lis.lifecycle", device_id, error = %err, "device_server_stop_failed");
        }
        info!(target: "lis.lifecycle", device_id, "device_server_deleted");
        Ok(())
    }

    pub fn get_all_serial_ports(&self) -> Result<Vec<String>, LifecycleError> {
        lis_protocol::available_serial_ports().map_err(LifecycleError::SerialPorts)
    }

    /// 按新的设备列表对齐：移除已不存在的设备，其余逐台启动或复用。
    ///
    /// 返回启动失败的设备及原因。
    pub async fn restart_all(&self, devices: &[Device]) -> Vec<(DeviceId, LifecycleError)> {
        let wanted: HashSet<DeviceId> = devices.iter().map(|device| device.id).collect();
        let obsolete: Vec<DeviceId> = {
            let servers = self.servers.lock().await;
            servers
                .keys()
                .filter(|id| !wanted.contains(id))
                .copied()
                .collect()
        };
        for device_id in obsolete {
            if let Err(err) = self.delete_server_by_device_id(device_id).await {
                warn!(target: "lis.lifecycle", device_id, error = %err, "device_server_delete_failed");
            }
        }

        let mut failures = Vec::new();
        for device in devices {
            if let Err(err) = self.start_new_server(device.clone()).await {
                error!(target: "lis.lifecycle", device_id = device.id, error = %err, "device_server_start_failed");
                failures.push((device.id, err));
            }
        }
        failures
    }

    /// 停止全部服务（进程退出时调用）。
    pub async fn shutdown(&self) {
        let servers = self.servers.lock().await;
        for (device_id, entry) in servers.iter() {
            if let Err(err) = entry.server.stop().await {
                warn!(target: "lis.lifecycle", device_id = *device_id, error = %err, "device_server_stop_failed");
            }
        }
        info!(target: "lis.lifecycle", count = servers.len(), "device_servers_shutdown");
    }
}
