//! 存储数据模型

use chrono::NaiveDateTime;
use domain::{ObservationRequest, ObservationResult, Patient};

/// 结果记录 ID（存储内自增）。
pub type ResultId = u64;

/// 单条已落库的检验结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub id: ResultId,
    pub result: ObservationResult,
    pub received_at: NaiveDateTime,
    /// 成功外发的时间；`None` 表示待同步。
    pub synced_at: Option<NaiveDateTime>,
}

impl ResultRecord {
    pub fn is_pending(&self) -> bool {
        self.synced_at.is_none()
    }
}

/// 按条码聚合的标本记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecimenRecord {
    pub barcode: String,
    pub patient: Patient,
    pub requests: Vec<ObservationRequest>,
    pub results: Vec<ResultRecord>,
    /// 最后一次写入结果的时间
    pub updated_at: NaiveDateTime,
}

impl SpecimenRecord {
    pub fn result_ids(&self) -> Vec<ResultId> {
        self.results.iter().map(|record| record.id).collect()
    }
}
