//! 单条报文的处理流水线。

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use lis_hl7::{DecodedMessage, Hl7Codec, RawMessage};
use tracing::{debug, info, warn};

use crate::ack::{build_ack, build_orr};
use crate::error::PipelineError;
use crate::mapping::map_message;
use crate::port::AnalyzerPort;
use crate::profile::DeviceProfile;

/// 清洗 → 解码 → 映射 → 下游处理 → 应答。
///
/// 同一设备服务内串行调用；任一阶段失败都不产生应答。
#[derive(Clone)]
pub struct ProtocolPipeline {
    profile: Arc<DeviceProfile>,
    codec: Arc<dyn Hl7Codec>,
    port: Arc<dyn AnalyzerPort>,
}

impl ProtocolPipeline {
    pub fn new(
        profile: DeviceProfile,
        codec: Arc<dyn Hl7Codec>,
        port: Arc<dyn AnalyzerPort>,
    ) -> Self {
        Self {
            profile: Arc::new(profile),
            codec,
            port,
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// 处理一帧，返回编码后的应答（不含 MLLP 包装）。
    pub async fn handle(&self, frame: &[u8]) -> Result<Vec<u8>, PipelineError> {
        self.handle_at(frame, chrono::Local::now().naive_local()).await
    }

    /// 以给定时间处理一帧（应答 MSH-7 等时间字段使用该时间）。
    pub async fn handle_at(
        &self,
        frame: &[u8],
        now: NaiveDateTime,
    ) -> Result<Vec<u8>, PipelineError> {
        lis_telemetry::record_message_received();
        let started = Instant::now();
        let result = self.run(frame, now).await;
        match &result {
            Ok(_) => {
                lis_telemetry::record_message_acked();
                lis_telemetry::record_process_latency_ms(started.elapsed().as_millis() as u64);
            }
            Err(err) => {
                lis_telemetry::record_pipeline_failure(err.stage());
                warn!(
                    target: "lis.pipeline",
                    family = self.profile.family.as_str(),
                    stage = ?err.stage(),
                    error = %err,
                    "pipeline_failed"
                );
            }
        }
        result
    }

    async fn run(&self, frame: &[u8], now: NaiveDateTime) -> Result<Vec<u8>, PipelineError> {
        let normalized = self.profile.normalizer.normalize_at(frame, now);
        if normalized.is_empty() {
            return Err(PipelineError::Frame("empty frame".to_string()));
        }

        let decoded = self.codec.decode(&normalized, self.profile.version)?;
        let message = map_message(&decoded, &self.profile)?;
        debug!(
            target: "lis.pipeline",
            family = self.profile.family.as_str(),
            kind = decoded.kind(),
            control_id = %message.header.control_id,
            specimens = message.specimens.len(),
            results = message.result_count(),
            "message_mapped"
        );

        let reply: RawMessage = match &decoded {
            DecodedMessage::OruR01(oru) => {
                self.port.process_oru_r01(message).await?;
                build_ack(&oru.msh, &self.profile.ack, now)
            }
            DecodedMessage::OrmO01(orm) => {
                let patient = message.patient.clone();
                let specimens = self.port.process_orm_o01(message).await?;
                if specimens.is_empty() {
                    return Err(PipelineError::Process(
                        "no specimens returned for order".to_string(),
                    ));
                }
                build_orr(&orm.msh, &self.profile.ack, &patient, &specimens, now)
            }
        };

        let encoded = self.codec.encode(&reply)?;
        info!(
            target: "lis.pipeline",
            family = self.profile.family.as_str(),
            kind = decoded.kind(),
            control_id = %decoded.msh().control_id,
            "message_acked"
        );
        Ok(encoded)
    }
}
