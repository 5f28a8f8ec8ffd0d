//! 按型号选择传输服务。

use std::sync::Arc;

use domain::{Device, TransportKind};
use lis_hl7::Hl7Codec;
use lis_pipeline::{AnalyzerPort, DeviceProfile, ProtocolPipeline};
use lis_protocol::{DeviceServer, SerialServer, TcpServer};

use crate::error::LifecycleError;

/// 设备 → 传输服务的分发器。
pub trait ServerStrategy: Send + Sync {
    /// 型号不支持时返回 `LifecycleError::DeviceTypeNotSupported`。
    fn choose_device_server(
        &self,
        device: &Device,
    ) -> Result<Arc<dyn DeviceServer>, LifecycleError>;
}

/// 默认分发器：串口型号 → `SerialServer`，TCP 型号 → `TcpServer`，
/// 两者都要求型号有 HL7 设备族配置。
#[derive(Clone)]
pub struct DeviceServerStrategy {
    codec: Arc<dyn Hl7Codec>,
    port: Arc<dyn AnalyzerPort>,
}

impl DeviceServerStrategy {
    pub fn new(codec: Arc<dyn Hl7Codec>, port: Arc<dyn AnalyzerPort>) -> Self {
        Self { codec, port }
    }
}

impl ServerStrategy for DeviceServerStrategy {
    fn choose_device_server(
        &self,
        device: &Device,
    ) -> Result<Arc<dyn DeviceServer>, LifecycleError> {
        let not_supported =
            || LifecycleError::DeviceTypeNotSupported(device.device_type.to_string());
        let profile =
            DeviceProfile::for_device_type(&device.device_type).ok_or_else(not_supported)?;
        let pipeline =
            ProtocolPipeline::new(profile, Arc::clone(&self.codec), Arc::clone(&self.port));

        match device.transport_kind() {
            TransportKind::Tcp => Ok(Arc::new(TcpServer::new(
                device.id,
                &device.receive_port,
                pipeline,
            ))),
            TransportKind::Serial => Ok(Arc::new(SerialServer::new(
                device.id,
                &device.receive_port,
                device.baud_rate,
                pipeline,
            ))),
            TransportKind::Unsupported => Err(not_supported()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::{CanonicalMessage, DeviceType, ServerState, Specimen};
    use lis_hl7::PipeCodec;
    use lis_pipeline::PortError;

    struct NullPort;

    #[async_trait]
    impl AnalyzerPort for NullPort {
        async fn process_oru_r01(&self, _message: CanonicalMessage) -> Result<(), PortError> {
            Ok(())
        }

        async fn process_orm_o01(
            &self,
            _message: CanonicalMessage,
        ) -> Result<Vec<Specimen>, PortError> {
            Ok(Vec::new())
        }
    }

    fn device(device_type: DeviceType) -> Device {
        Device {
            id: 1,
            name: "analyzer".into(),
            device_type,
            receive_port: "5100".into(),
            baud_rate: 9600,
        }
    }

    fn strategy() -> DeviceServerStrategy {
        DeviceServerStrategy::new(Arc::new(PipeCodec::new()), Arc::new(NullPort))
    }

    #[test]
    fn hl7_types_get_a_server() {
        for device_type in [
            DeviceType::A15,
            DeviceType::AnalyxTria,
            DeviceType::Wondfo,
            DeviceType::EdanI15,
            DeviceType::NeomedicaNcc3300,
        ] {
            let server = strategy()
                .choose_device_server(&device(device_type))
                .expect("server");
            assert_eq!(server.state(), ServerState::Stopped);
        }
    }

    #[test]
    fn other_types_are_not_supported() {
        for device_type in [
            DeviceType::Coax,
            DeviceType::Abbott,
            DeviceType::Unknown("XYZ".into()),
        ] {
            let result = strategy().choose_device_server(&device(device_type));
            assert!(matches!(
                result,
                Err(LifecycleError::DeviceTypeNotSupported(_))
            ));
        }
    }
}
