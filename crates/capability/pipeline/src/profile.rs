//! 设备族配置：一张表描述每个仪器族在各阶段的差异。

use domain::DeviceType;
use lis_hl7::Hl7Version;
use lis_normalize::{
    CaretEscape, FieldAction, Normalizer, QuirkRule, RuleSet, SanitizeStep, StructuralRule,
};

use crate::barcode::{BarcodePolicy, BarcodeSource};

/// 本系统在 ACK 中的应用名。
pub const THIS_APPLICATION: &str = "LIS";
/// 本系统在 ACK 中的机构名。
pub const THIS_FACILITY: &str = "Lab01";

/// 设备族。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    Generic,
    Swelab,
    AnalyxTrias,
    AnalyxPanca,
    Wondfo,
    EdanH30,
    EdanI15,
    Ncc3300,
}

impl DeviceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Swelab => "swelab",
            Self::AnalyxTrias => "analyx_trias",
            Self::AnalyxPanca => "analyx_panca",
            Self::Wondfo => "wondfo",
            Self::EdanH30 => "edan_h30",
            Self::EdanI15 => "edan_i15",
            Self::Ncc3300 => "ncc_3300",
        }
    }
}

/// 报文分帧方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `0x0B … 0x1C 0x0D`
    Mllp,
    /// 单次读取，应答不加 MLLP 包装
    Raw,
    /// 串口静默超时分帧
    IdleTimeout,
}

/// 串口 ACK 投递方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDelivery {
    Reply,
    /// 仅记录日志，不写回端口
    LogOnly,
}

/// ACK 头部覆盖项。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckPolicy {
    pub version: &'static str,
    pub processing_id: &'static str,
    pub accept_ack_type: &'static str,
    pub application_ack_type: &'static str,
    pub country_code: &'static str,
    pub charset: &'static str,
    /// MSH-21 组件，如 `["LAB-28", "IHE"]`
    pub message_profile: &'static [&'static str],
    /// 保留来报发送方作为 ACK 发送方
    pub keep_inbound_sender: bool,
    pub delivery: AckDelivery,
}

impl AckPolicy {
    const fn standard(version: &'static str) -> Self {
        Self {
            version,
            processing_id: "P",
            accept_ack_type: "",
            application_ack_type: "",
            country_code: "",
            charset: "",
            message_profile: &[],
            keep_inbound_sender: false,
            delivery: AckDelivery::Reply,
        }
    }

    const fn lab28(country_code: &'static str, keep_inbound_sender: bool) -> Self {
        Self {
            version: "2.4",
            processing_id: "P",
            accept_ack_type: "NE",
            application_ack_type: "NE",
            country_code,
            charset: "UTF8",
            message_profile: &["LAB-28", "IHE"],
            keep_inbound_sender,
            delivery: AckDelivery::Reply,
        }
    }
}

/// 单个设备族的完整配置。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub family: DeviceFamily,
    pub version: Hl7Version,
    pub framing: Framing,
    /// 连接建立后先探测 `STX STX` 心跳
    pub pinger: bool,
    pub normalizer: Normalizer,
    pub barcode: BarcodePolicy,
    /// 结果值中夹带单位（`"0.42 ng/mL"`）
    pub split_value_unit: bool,
    pub ack: AckPolicy,
}

const SEX_CODES: &[&str] = &["M", "F", "O", "U", "A", "N"];
const SERIAL_SEGMENTS: &[&str] = &["MSH", "PID", "PV1", "OBR", "OBX"];
const WONDFO_PREFIXES: &[&str] = &["SER", "WBL", "URI", "SEM", "PLM", "LIQ", "CSF"];

impl DeviceProfile {
    /// 型号 → 设备族配置；非 HL7 型号返回 `None`。
    pub fn for_device_type(device_type: &DeviceType) -> Option<Self> {
        let profile = match device_type {
            DeviceType::A15
            | DeviceType::Ba200
            | DeviceType::Ba400
            | DeviceType::Other
            | DeviceType::NeomedicaNcc61 => Self::generic(DeviceFamily::Generic),
            DeviceType::SwelabAlfa | DeviceType::SwelabBasic | DeviceType::SwelabLumi => {
                Self::generic(DeviceFamily::Swelab)
            }
            DeviceType::AnalyxTria => Self::analyx(DeviceFamily::AnalyxTrias, true),
            DeviceType::AnalyxPanca => Self::analyx(DeviceFamily::AnalyxPanca, false),
            DeviceType::Wondfo => Self::wondfo(),
            DeviceType::EdanH30 => Self::edan(DeviceFamily::EdanH30),
            DeviceType::EdanI15 => Self::edan(DeviceFamily::EdanI15),
            DeviceType::NeomedicaNcc3300 => Self::ncc3300(),
            _ => return None,
        };
        Some(profile)
    }

    fn generic(family: DeviceFamily) -> Self {
        Self {
            family,
            version: Hl7Version::V2_5_1,
            framing: Framing::Mllp,
            pinger: false,
            normalizer: Normalizer::default(),
            barcode: BarcodePolicy::standard(),
            split_value_unit: false,
            ack: AckPolicy::standard("2.5.1"),
        }
    }

    fn analyx(family: DeviceFamily, pinger: bool) -> Self {
        let rules = RuleSet {
            structural: Vec::new(),
            fields: vec![QuirkRule::new(
                "OBX",
                6,
                FieldAction::EscapeCaret(CaretEscape::Formal),
            )],
        };
        Self {
            family,
            version: Hl7Version::V2_3_1,
            framing: Framing::Mllp,
            pinger,
            normalizer: Normalizer::new(Vec::new(), rules),
            barcode: BarcodePolicy::standard(),
            split_value_unit: false,
            ack: AckPolicy {
                charset: "UNICODE",
                ..AckPolicy::standard("2.3.1")
            },
        }
    }

    fn wondfo() -> Self {
        Self {
            family: DeviceFamily::Wondfo,
            version: Hl7Version::V2_5_1,
            framing: Framing::Raw,
            pinger: false,
            normalizer: Normalizer::new(vec![SanitizeStep::TrimControl], RuleSet::default()),
            barcode: BarcodePolicy {
                preferred: vec![BarcodeSource::PidNames, BarcodeSource::PidIdentifierComponents],
                prefixes: WONDFO_PREFIXES,
                fallback: vec![BarcodeSource::PidSimpleIdentifiers],
            },
            split_value_unit: true,
            ack: AckPolicy::lab28("CHN", true),
        }
    }

    fn edan(family: DeviceFamily) -> Self {
        let mut fields = vec![QuirkRule::new(
            "OBR",
            6,
            FieldAction::ClearUnlessPrefix("20"),
        )];
        match family {
            DeviceFamily::EdanI15 => {
                fields.push(QuirkRule::new(
                    "OBX",
                    7,
                    FieldAction::EscapeCaret(CaretEscape::Hyphen),
                ));
                fields.push(QuirkRule::new("OBX", 6, FieldAction::NormalizeUnits));
                fields.push(QuirkRule::new("OBX", 12, FieldAction::Clear));
            }
            _ => {
                fields.push(QuirkRule::new(
                    "OBX",
                    7,
                    FieldAction::EscapeCaret(CaretEscape::Formal),
                ));
                fields.push(QuirkRule::new("OBX", 6, FieldAction::NormalizeUnits));
                fields.push(QuirkRule::new("OBX", 12, FieldAction::ClearIfInvalidDateTime));
            }
        }
        Self {
            family,
            version: Hl7Version::V2_5_1,
            framing: Framing::Mllp,
            pinger: false,
            normalizer: Normalizer::new(
                vec![SanitizeStep::TrimControl],
                RuleSet {
                    structural: Vec::new(),
                    fields,
                },
            ),
            barcode: BarcodePolicy {
                preferred: vec![
                    BarcodeSource::PidPatientId,
                    BarcodeSource::PidIdentifiers,
                    BarcodeSource::PidFamilyName,
                    BarcodeSource::ObrFiller,
                    BarcodeSource::ObrPlacer,
                    BarcodeSource::ObrUniversalService,
                ],
                prefixes: &[],
                fallback: Vec::new(),
            },
            split_value_unit: false,
            ack: AckPolicy::lab28("ID", false),
        }
    }

    fn ncc3300() -> Self {
        let rules = RuleSet {
            structural: vec![
                StructuralRule::KeepSegments(SERIAL_SEGMENTS),
                StructuralRule::RenumberObx,
                StructuralRule::EnsurePv1AfterPid,
                StructuralRule::EnsureObrBeforeObx,
            ],
            fields: vec![
                QuirkRule::new("PID", 7, FieldAction::ClearIfEquals("1")),
                QuirkRule::new("PID", 8, FieldAction::ClearUnlessOneOf(SEX_CODES)),
            ],
        };
        Self {
            family: DeviceFamily::Ncc3300,
            version: Hl7Version::V2_5_1,
            framing: Framing::IdleTimeout,
            pinger: false,
            normalizer: Normalizer::new(
                vec![SanitizeStep::PrintableOnly, SanitizeStep::SplitSegments],
                rules,
            ),
            barcode: BarcodePolicy::standard(),
            split_value_unit: false,
            ack: AckPolicy {
                delivery: AckDelivery::LogOnly,
                ..AckPolicy::standard("2.5.1")
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_hl7_types_have_no_profile() {
        assert!(DeviceProfile::for_device_type(&DeviceType::Abbott).is_none());
        assert!(DeviceProfile::for_device_type(&DeviceType::Coax).is_none());
        assert!(DeviceProfile::for_device_type(&DeviceType::Unknown("X".into())).is_none());
    }

    #[test]
    fn family_table() {
        let trias = DeviceProfile::for_device_type(&DeviceType::AnalyxTria).expect("trias");
        assert_eq!(trias.version, Hl7Version::V2_3_1);
        assert!(trias.pinger);
        assert_eq!(trias.ack.charset, "UNICODE");

        let panca = DeviceProfile::for_device_type(&DeviceType::AnalyxPanca).expect("panca");
        assert!(!panca.pinger);

        let wondfo = DeviceProfile::for_device_type(&DeviceType::Wondfo).expect("wondfo");
        assert_eq!(wondfo.framing, Framing::Raw);
        assert!(wondfo.ack.keep_inbound_sender);
        assert_eq!(wondfo.ack.country_code, "CHN");

        let ncc = DeviceProfile::for_device_type(&DeviceType::NeomedicaNcc3300).expect("ncc");
        assert_eq!(ncc.framing, Framing::IdleTimeout);
        assert_eq!(ncc.ack.delivery, AckDelivery::LogOnly);

        let lumi = DeviceProfile::for_device_type(&DeviceType::SwelabLumi).expect("lumi");
        assert_eq!(lumi.family, DeviceFamily::Swelab);
    }
}
