//! 设备服务接口与空服务。

use std::sync::Mutex;

use async_trait::async_trait;
use domain::{DeviceId, ServerState};

use crate::error::ProtocolError;

/// 单台设备的接收服务。
///
/// 调用顺序：`set_port`（可选）→ `start` → `serve` → `stop`。
#[async_trait]
pub trait DeviceServer: Send + Sync {
    fn device_id(&self) -> DeviceId;

    fn set_port(&self, port: &str);

    /// 打开监听 / 串口；失败时服务保持 `Stopped`。
    async fn start(&self) -> Result<(), ProtocolError>;

    /// 启动后台任务后立即返回。
    fn serve(&self) -> Result<(), ProtocolError>;

    fn state(&self) -> ServerState;

    async fn stop(&self) -> Result<(), ProtocolError>;
}

/// 非 HL7 型号占位服务，所有操作均为空操作。
#[derive(Debug)]
pub struct DummyServer {
    device_id: DeviceId,
}

impl DummyServer {
    pub fn new(device_id: DeviceId) -> Self {
        Self { device_id }
    }
}

#[async_trait]
impl DeviceServer for DummyServer {
    fn device_id(&self) -> DeviceId {
        self.device_id
    }

    fn set_port(&self, _port: &str) {}

    async fn start(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn serve(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn state(&self) -> ServerState {
        ServerState::NoServer
    }

    async fn stop(&self) -> Result<(), ProtocolError> {
        Ok(())
    }
}

/// 服务状态单元。
#[derive(Debug)]
pub(crate) struct StateCell(Mutex<ServerState>);

impl StateCell {
    pub(crate) fn new(state: ServerState) -> Self {
        Self(Mutex::new(state))
    }

    pub(crate) fn get(&self) -> ServerState {
        self.0.lock().map(|state| *state).unwrap_or(ServerState::Stopped)
    }

    pub(crate) fn set(&self, state: ServerState) {
        if let Ok(mut current) = self.0.lock() {
            *current = state;
        }
    }

    /// 仅在未停止时更新（后台任务与 stop 竞争时以 stop 为准）。
    pub(crate) fn set_if_running(&self, state: ServerState) {
        if let Ok(mut current) = self.0.lock() {
            if *current != ServerState::Stopped {
                *current = state;
            }
        }
    }
}

/// 解析端口号；`"0"` 表示由系统分配。
pub(crate) fn parse_port(port: &str) -> Result<u16, ProtocolError> {
    port.trim()
        .parse::<u16>()
        .map_err(|_| ProtocolError::InvalidPort(port.to_string()))
}
