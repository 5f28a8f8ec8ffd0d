//! 传输层错误类型定义

/// 传输服务错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 端口配置不合法
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// 监听失败
    #[error("bind {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 串口打开 / 读写错误
    #[error("serial error: {0}")]
    Serial(String),

    /// 帧超过上限
    #[error("frame exceeds {0} bytes")]
    FrameTooLarge(usize),

    /// 未调用 start 即 serve
    #[error("server not started")]
    NotStarted,
}

impl From<serialport::Error> for ProtocolError {
    fn from(err: serialport::Error) -> Self {
        Self::Serial(err.to_string())
    }
}
