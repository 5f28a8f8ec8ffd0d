//! # 检验结果存储
//!
//! - [`ResultStore`]：标本 / 结果写入、按条码查询、待同步查询与同步标记
//! - [`InMemoryResultStore`]：`RwLock<HashMap>` 内存实现
//!
//! 结果从写入起处于待同步状态，外发成功后由同步任务标记；
//! 发送成功但标记前进程退出的结果会被再次发送（至少一次）。

mod error;
mod in_memory;
mod models;
mod traits;

pub use error::StorageError;
pub use in_memory::InMemoryResultStore;
pub use models::{ResultId, ResultRecord, SpecimenRecord};
pub use traits::ResultStore;
