//! # 协议适配流水线
//!
//! 一条通用流水线，由 `DeviceProfile` 描述各设备族差异：
//! - 语法版本与分帧方式
//! - 清洗步骤与字段修正规则表
//! - 条码优先级链
//! - ACK 头部覆盖项
//!
//! ```text
//! frame ─normalize─▶ bytes ─decode─▶ DecodedMessage ─map─▶ CanonicalMessage
//!                                                            │
//!                                         AnalyzerPort ◀─────┘
//!                                              │
//!                        ACK^R01 / ORR^O02 ◀───┘
//! ```

mod ack;
mod barcode;
mod error;
mod mapping;
mod pipeline;
mod port;
mod profile;

pub use ack::{build_ack, build_orr};
pub use barcode::{BarcodePolicy, BarcodeSource};
pub use error::{MappingError, PipelineError, PortError};
pub use mapping::map_message;
pub use pipeline::ProtocolPipeline;
pub use port::AnalyzerPort;
pub use profile::{
    AckDelivery, AckPolicy, DeviceFamily, DeviceProfile, Framing, THIS_APPLICATION, THIS_FACILITY,
};
