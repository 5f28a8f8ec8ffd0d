//! 存储接口 Trait 定义

use async_trait::async_trait;
use chrono::NaiveDateTime;
use domain::{Patient, Specimen};

use crate::error::StorageError;
use crate::models::{ResultId, SpecimenRecord};

/// 检验结果存储接口
///
/// 协议流水线写入，同步任务读取待同步结果并回写同步时间。
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// 按条码写入标本及其结果，返回新增结果条数。
    ///
    /// 同一条码的标本被合并：患者信息以最新一次为准，申请按检验代码去重。
    async fn save_specimen(
        &self,
        patient: &Patient,
        specimen: &Specimen,
        received_at: NaiveDateTime,
    ) -> Result<usize, StorageError>;

    async fn find_by_barcode(&self, barcode: &str)
    -> Result<Option<SpecimenRecord>, StorageError>;

    /// 含待同步结果的标本；每个标本只带待同步的结果，按条码排序。
    async fn pending_sync(&self) -> Result<Vec<SpecimenRecord>, StorageError>;

    /// 标记结果已同步，返回实际更新条数（已同步或不存在的 ID 被忽略）。
    async fn mark_synced(
        &self,
        ids: &[ResultId],
        synced_at: NaiveDateTime,
    ) -> Result<usize, StorageError>;
}
