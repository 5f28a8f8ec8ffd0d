//! 流水线错误类型定义

use lis_hl7::{DecodeError, EncodeError};

/// 下游处理错误。
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PortError {
    message: String,
}

impl PortError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 结构映射错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// 报文没有任何结果或申请
    #[error("message carries no observations or orders")]
    Empty,
}

/// 流水线错误；任何一种都不会生成 NAK，仪器收不到应答。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("frame error: {0}")]
    Frame(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("process error: {0}")]
    Process(String),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

impl PipelineError {
    pub fn stage(&self) -> lis_telemetry::FailureStage {
        use lis_telemetry::FailureStage;
        match self {
            Self::Frame(_) => FailureStage::Frame,
            Self::Decode(_) => FailureStage::Decode,
            Self::Mapping(_) => FailureStage::Mapping,
            Self::Process(_) => FailureStage::Process,
            Self::Encode(_) => FailureStage::Encode,
        }
    }
}

impl From<PortError> for PipelineError {
    fn from(err: PortError) -> Self {
        Self::Process(err.to_string())
    }
}
