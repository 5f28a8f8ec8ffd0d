//! ORU^R01 / ORM^O01 的类型化视图。
//!
//! 视图在构造时完成时间戳字段校验，字段值均已还原转义。

use chrono::NaiveDateTime;

use crate::codec::Hl7Version;
use crate::datetime::parse_ts;
use crate::error::DecodeError;
use crate::segment::{Delimiters, Segment, component_of};

/// 编码元素（CE / CWE）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodedElement {
    pub identifier: String,
    pub text: String,
    pub coding_system: String,
}

impl CodedElement {
    fn read(segment: &Segment, index: usize, d: &Delimiters) -> Self {
        Self {
            identifier: segment.component(index, 1, d),
            text: segment.component(index, 2, d),
            coding_system: segment.component(index, 3, d),
        }
    }
}

/// 姓名（XPN）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonName {
    pub family: String,
    pub given: String,
}

fn timestamp(
    segment: &Segment,
    index: usize,
    d: &Delimiters,
) -> Result<Option<NaiveDateTime>, DecodeError> {
    let value = segment.component(index, 1, d);
    parse_ts(&value).map_err(|_| DecodeError::InvalidTimestamp {
        field: format!("{}-{}", segment.name(), index),
        value,
    })
}

/// 消息头（MSH）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Msh {
    /// MSH-1 / MSH-2
    pub delimiters: Delimiters,
    pub sending_application: String,
    pub sending_facility: String,
    pub receiving_application: String,
    pub receiving_facility: String,
    pub timestamp: Option<NaiveDateTime>,
    pub message_type: String,
    pub trigger_event: String,
    pub message_structure: String,
    pub control_id: String,
    pub processing_id: String,
    pub version: String,
    pub accept_ack_type: String,
    pub application_ack_type: String,
    pub country_code: String,
    pub charset: String,
}

impl Msh {
    pub fn read(segment: &Segment, d: &Delimiters) -> Result<Self, DecodeError> {
        Ok(Self {
            delimiters: *d,
            sending_application: segment.component(3, 1, d),
            sending_facility: segment.component(4, 1, d),
            receiving_application: segment.component(5, 1, d),
            receiving_facility: segment.component(6, 1, d),
            timestamp: timestamp(segment, 7, d)?,
            message_type: segment.component(9, 1, d),
            trigger_event: segment.component(9, 2, d),
            message_structure: segment.component(9, 3, d),
            control_id: segment.component(10, 1, d),
            processing_id: segment.component(11, 1, d),
            version: segment.component(12, 1, d),
            accept_ack_type: segment.component(15, 1, d),
            application_ack_type: segment.component(16, 1, d),
            country_code: segment.component(17, 1, d),
            charset: segment.component(18, 1, d),
        })
    }
}

/// 患者标识（PID）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pid {
    pub set_id: String,
    /// PID-2 外部患者 ID
    pub patient_id: String,
    /// PID-3 标识列表，每个重复的第一个组件
    pub identifiers: Vec<String>,
    /// PID-3 原始重复（含组件分隔符）
    pub identifier_repetitions: Vec<String>,
    pub names: Vec<PersonName>,
    pub birth_date: Option<NaiveDateTime>,
    pub sex: String,
    pub address: String,
}

impl Pid {
    pub fn read(segment: &Segment, d: &Delimiters) -> Result<Self, DecodeError> {
        let identifier_repetitions: Vec<String> =
            segment.repetitions(3, d).map(str::to_string).collect();
        let identifiers = identifier_repetitions
            .iter()
            .map(|rep| component_of(rep, 1, d))
            .collect();
        let names = segment
            .repetitions(5, d)
            .map(|rep| PersonName {
                family: component_of(rep, 1, d),
                given: component_of(rep, 2, d),
            })
            .collect();
        let address = segment
            .repetitions(11, d)
            .next()
            .map(|rep| {
                [1, 3, 4, 5, 6]
                    .iter()
                    .map(|idx| component_of(rep, *idx, d))
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        Ok(Self {
            set_id: segment.component(1, 1, d),
            patient_id: segment.component(2, 1, d),
            identifiers,
            identifier_repetitions,
            names,
            birth_date: timestamp(segment, 7, d)?,
            sex: segment.component(8, 1, d),
            address,
        })
    }
}

/// 检验申请（OBR）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Obr {
    pub set_id: String,
    pub placer_order_number: String,
    pub filler_order_number: String,
    pub universal_service: CodedElement,
    pub requested_at: Option<NaiveDateTime>,
    pub observed_at: Option<NaiveDateTime>,
    pub observation_end: Option<NaiveDateTime>,
    pub specimen_received_at: Option<NaiveDateTime>,
}

impl Obr {
    pub fn read(segment: &Segment, d: &Delimiters) -> Result<Self, DecodeError> {
        Ok(Self {
            set_id: segment.component(1, 1, d),
            placer_order_number: segment.component(2, 1, d),
            filler_order_number: segment.component(3, 1, d),
            universal_service: CodedElement::read(segment, 4, d),
            requested_at: timestamp(segment, 6, d)?,
            observed_at: timestamp(segment, 7, d)?,
            observation_end: timestamp(segment, 8, d)?,
            specimen_received_at: timestamp(segment, 14, d)?,
        })
    }
}

/// 单项结果（OBX）及其后续 NTE 注释。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Obx {
    pub set_id: String,
    pub value_type: String,
    pub observation_id: CodedElement,
    pub sub_id: String,
    pub values: Vec<String>,
    pub units: CodedElement,
    pub reference_range: String,
    pub abnormal_flags: Vec<String>,
    pub result_status: String,
    pub effective_date: Option<NaiveDateTime>,
    pub observed_at: Option<NaiveDateTime>,
    /// OBX-19，仅 2.5 及以上
    pub analyzed_at: Option<NaiveDateTime>,
    pub notes: Vec<String>,
}

impl Obx {
    pub fn read(segment: &Segment, d: &Delimiters, version: Hl7Version) -> Result<Self, DecodeError> {
        let analyzed_at = match version {
            Hl7Version::V2_5_1 => timestamp(segment, 19, d)?,
            Hl7Version::V2_3_1 => None,
        };
        Ok(Self {
            set_id: segment.component(1, 1, d),
            value_type: segment.component(2, 1, d),
            observation_id: CodedElement::read(segment, 3, d),
            sub_id: segment.component(4, 1, d),
            values: segment
                .repetitions(5, d)
                .map(|rep| crate::escape::unescape(rep, d))
                .collect(),
            units: CodedElement::read(segment, 6, d),
            reference_range: segment.component(7, 1, d),
            abnormal_flags: segment
                .repetitions(8, d)
                .map(|rep| component_of(rep, 1, d))
                .filter(|flag| !flag.is_empty())
                .collect(),
            result_status: segment.component(11, 1, d),
            effective_date: timestamp(segment, 12, d)?,
            observed_at: timestamp(segment, 14, d)?,
            analyzed_at,
            notes: Vec::new(),
        })
    }
}

/// 通用医嘱（ORC）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Orc {
    pub order_control: String,
    pub placer_order_number: String,
    pub filler_order_number: String,
    pub order_status: String,
    pub transaction_at: Option<NaiveDateTime>,
}

impl Orc {
    pub fn read(segment: &Segment, d: &Delimiters) -> Result<Self, DecodeError> {
        Ok(Self {
            order_control: segment.component(1, 1, d),
            placer_order_number: segment.component(2, 1, d),
            filler_order_number: segment.component(3, 1, d),
            order_status: segment.component(5, 1, d),
            transaction_at: timestamp(segment, 9, d)?,
        })
    }
}

/// ORU^R01 中的一个 OBR 组。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderObservation {
    /// OBX 出现在任何 OBR 之前时为空
    pub obr: Option<Obr>,
    pub observations: Vec<Obx>,
}

/// ORU^R01 结果报告。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OruR01 {
    pub msh: Msh,
    pub pid: Option<Pid>,
    pub order_observations: Vec<OrderObservation>,
}

/// ORM^O01 中的一个医嘱组。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderGroup {
    pub orc: Option<Orc>,
    pub obr: Option<Obr>,
}

/// ORM^O01 检验医嘱。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrmO01 {
    pub msh: Msh,
    pub pid: Option<Pid>,
    pub orders: Vec<OrderGroup>,
}

/// 解码结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedMessage {
    OruR01(OruR01),
    OrmO01(OrmO01),
}

impl DecodedMessage {
    pub fn msh(&self) -> &Msh {
        match self {
            Self::OruR01(message) => &message.msh,
            Self::OrmO01(message) => &message.msh,
        }
    }

    /// 消息类型标签（如 `ORU^R01`）。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OruR01(_) => "ORU^R01",
            Self::OrmO01(_) => "ORM^O01",
        }
    }
}
