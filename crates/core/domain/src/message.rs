//! 规范化检验消息（与仪器方言无关）。

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// 消息头。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageHeader {
    pub sending_application: String,
    pub sending_facility: String,
    pub receiving_application: String,
    pub receiving_facility: String,
    /// 消息类型（如 `ORU`）。
    pub message_type: String,
    /// 触发事件（如 `R01`）。
    pub trigger_event: String,
    pub control_id: String,
    pub version: String,
    pub message_time: Option<NaiveDateTime>,
}

/// 性别。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Sex {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Sex {
    /// HL7 表 0001 编码。
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "M" => Self::Male,
            "F" => Self::Female,
            "O" | "A" | "N" => Self::Other,
            _ => Self::Unknown,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Other => "O",
            Self::Unknown => "U",
        }
    }
}

/// 患者信息。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    pub sex: Sex,
    pub address: String,
}

/// 单项检验结果（OBX）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservationResult {
    pub test_code: String,
    pub description: String,
    /// 按原顺序的结果值，映射成功时总是存在（可为空）。
    pub values: Vec<String>,
    pub unit: String,
    pub reference_range: String,
    pub abnormal_flag: String,
    pub value_type: String,
    pub timestamp: Option<NaiveDateTime>,
    pub comments: String,
}

/// 检验申请（OBR / ORC）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObservationRequest {
    pub test_code: String,
    pub description: String,
    pub requested_at: Option<NaiveDateTime>,
}

/// 标本。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Specimen {
    pub barcode: String,
    pub observation_results: Vec<ObservationResult>,
    pub observation_requests: Vec<ObservationRequest>,
}

/// 规范化消息：恰好一个消息头、一个患者、若干标本。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalMessage {
    pub header: MessageHeader,
    pub patient: Patient,
    pub specimens: Vec<Specimen>,
}

impl CanonicalMessage {
    /// 所有标本中的结果总数。
    pub fn result_count(&self) -> usize {
        self.specimens
            .iter()
            .map(|specimen| specimen.observation_results.len())
            .sum()
    }
}
