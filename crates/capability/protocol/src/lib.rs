//! # 传输服务能力模块
//!
//! 每台设备一个 `DeviceServer`，负责收帧并把报文交给 `ProtocolPipeline`：
//! - **TcpServer**：MLLP 或原始读取，每个连接一条报文
//! - **SerialServer**：8N1 串口，300 ms 静默切分报文
//! - **DummyServer**：非 HL7 型号的占位服务
//!
//! ## 架构设计
//!
//! ```text
//! Device (type, receive_port, baud_rate)
//!       │
//!       ▼
//! DeviceServer ──frame──▶ ProtocolPipeline ──ack──▶ DeviceServer
//!  ├── TcpServer     (accept loop + cleanup loop + 每连接任务)
//!  ├── SerialServer  (阻塞读线程 → mpsc → IdleAssembler)
//!  └── DummyServer
//! ```

mod error;
mod framing;
mod pinger;
mod serial_server;
mod server;
mod tcp_server;

pub use error::ProtocolError;
pub use framing::{
    ACKNOWLEDGE, CARRIAGE_RETURN, END_BLOCK, IdleAssembler, MAX_FRAME_BYTES, START_BLOCK,
    START_OF_TEXT, read_mllp_frame, read_raw_frame, wrap_mllp,
};
pub use pinger::answer_ping;
pub use serial_server::{
    SERIAL_CONNECT_WINDOW, SERIAL_IDLE, SerialServer, SerialWorkers, SessionActivity,
    run_idle_session,
};
pub use server::{DeviceServer, DummyServer};
pub use tcp_server::{TcpServer, TcpTiming};

/// 枚举本机串口名称。
pub fn available_serial_ports() -> Result<Vec<String>, ProtocolError> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}
