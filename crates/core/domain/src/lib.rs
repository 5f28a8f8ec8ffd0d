//! 核心领域模型：设备、服务状态与规范化检验消息。
//!
//! 所有能力模块共享这些类型；本 crate 不依赖任何运行时。

pub mod device;
pub mod message;

pub use device::{Device, DeviceId, DeviceType, ServerState, TransportKind};
pub use message::{
    CanonicalMessage, MessageHeader, ObservationRequest, ObservationResult, Patient, Sex, Specimen,
};
