//! 生命周期错误类型定义

use domain::DeviceId;
use lis_protocol::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// 型号没有对应的传输服务
    #[error("device type not supported: {0}")]
    DeviceTypeNotSupported(String),

    #[error("device server not found: {0}")]
    NotFound(DeviceId),

    #[error("start device {device_id} failed: {source}")]
    Start {
        device_id: DeviceId,
        #[source]
        source: ProtocolError,
    },

    #[error("stop device {device_id} failed: {source}")]
    Stop {
        device_id: DeviceId,
        #[source]
        source: ProtocolError,
    },

    #[error("list serial ports failed: {0}")]
    SerialPorts(#[source] ProtocolError),
}
