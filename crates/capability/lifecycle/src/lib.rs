//! # 设备服务生命周期
//!
//! 维护 `设备 ID → (配置快照, DeviceServer)` 表：
//!
//! ```text
//! NoServer (不支持的型号，DummyServer)
//! Stopped ──start──▶ Serving ⇄ Connect ──stop──▶ Stopped
//! ```
//!
//! 同一设备再次 `start_new_server` 时，仅当服务已停止或端口等配置变化才重启。

mod error;
mod manager;
mod strategy;

pub use error::LifecycleError;
pub use manager::DeviceServerManager;
pub use strategy::{DeviceServerStrategy, ServerStrategy};
