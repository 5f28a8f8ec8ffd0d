//! LIS 网关：设备服务、协议流水线、外发同步与 HTTP 辅助接口的装配。

pub mod analyzer;
pub mod http;
pub mod reload;

pub use analyzer::StoreAnalyzerPort;
pub use http::{AppState, LinkGenerator, build_router};
pub use reload::{reload_devices, spawn_device_reloader};
