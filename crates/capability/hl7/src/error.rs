//! HL7 编解码错误类型定义

/// 解码错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// 空报文
    #[error("empty message")]
    Empty,

    /// 报文非 UTF-8 编码
    #[error("message is not valid utf-8: {0}")]
    InvalidUtf8(String),

    /// 首段不是 MSH
    #[error("message must start with MSH segment, got {0:?}")]
    MissingHeader(String),

    /// 编码字符（MSH-1 / MSH-2）非法
    #[error("invalid encoding characters: {0:?}")]
    InvalidEncodingCharacters(String),

    /// 时间戳字段格式非法
    #[error("invalid timestamp in {field}: {value:?}")]
    InvalidTimestamp { field: String, value: String },

    /// 不支持的消息类型（仅 ORU^R01 / ORM^O01）
    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(String),
}

/// 编码错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// 缺少 MSH 段
    #[error("message has no MSH segment")]
    MissingHeader,

    /// 段名非法
    #[error("invalid segment name: {0:?}")]
    InvalidSegmentName(String),
}
