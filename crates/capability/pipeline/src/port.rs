//! 下游处理端口。

use async_trait::async_trait;
use domain::{CanonicalMessage, Specimen};

use crate::error::PortError;

/// 规范化消息的消费方（入库、转发等）。
#[async_trait]
pub trait AnalyzerPort: Send + Sync {
    /// 处理结果报告。
    async fn process_oru_r01(&self, message: CanonicalMessage) -> Result<(), PortError>;

    /// 处理检验医嘱，返回需要回写给仪器的标本及其申请。
    async fn process_orm_o01(&self, message: CanonicalMessage) -> Result<Vec<Specimen>, PortError>;
}
