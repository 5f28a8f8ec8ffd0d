//! 设备配置快照与设备服务状态。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 设备 ID（与配置中的主键一致）。
pub type DeviceId = i64;

/// 传输方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Tcp,
    Serial,
    /// 非 HL7 协议或未知型号，不启动服务。
    Unsupported,
}

/// 分析仪型号。
///
/// 配置中的字符串与原系统保持一致（如 `ANALYX_TRIA`）；
/// 无法识别的型号保留原值，按不支持处理。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceType {
    A15,
    Ba200,
    Ba400,
    AnalyxTria,
    AnalyxPanca,
    SwelabAlfa,
    SwelabBasic,
    SwelabLumi,
    NeomedicaNcc61,
    Other,
    Wondfo,
    EdanH30,
    EdanI15,
    Coax,
    Diestro,
    NeomedicaNcc3300,
    Alifax,
    Cbs400,
    VerifyU120,
    Abbott,
    Response911,
    Bts,
    Unknown(String),
}

impl DeviceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::A15 => "A15",
            Self::Ba200 => "BA200",
            Self::Ba400 => "BA400",
            Self::AnalyxTria => "ANALYX_TRIA",
            Self::AnalyxPanca => "ANALYX_PANCA",
            Self::SwelabAlfa => "SWELAB_ALFA",
            Self::SwelabBasic => "SWELAB_BASIC",
            Self::SwelabLumi => "SWELAB_LUMI",
            Self::NeomedicaNcc61 => "NEOMEDICA_NCC_61",
            Self::Other => "OTHER",
            Self::Wondfo => "WONDFO",
            Self::EdanH30 => "EDAN_H30",
            Self::EdanI15 => "EDAN_I15",
            Self::Coax => "COAX",
            Self::Diestro => "DIESTRO",
            Self::NeomedicaNcc3300 => "NEOMEDICA_NCC_3300",
            Self::Alifax => "ALIFAX",
            Self::Cbs400 => "CBS400",
            Self::VerifyU120 => "VERIFY_U120",
            Self::Abbott => "ABBOTT",
            Self::Response911 => "RESPONSE_911",
            Self::Bts => "BTS",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    /// 型号对应的传输方式。
    pub fn transport_kind(&self) -> TransportKind {
        match self {
            Self::A15
            | Self::Ba200
            | Self::Ba400
            | Self::AnalyxTria
            | Self::AnalyxPanca
            | Self::SwelabAlfa
            | Self::SwelabBasic
            | Self::SwelabLumi
            | Self::NeomedicaNcc61
            | Self::Other
            | Self::Wondfo
            | Self::EdanH30
            | Self::EdanI15 => TransportKind::Tcp,
            Self::Coax
            | Self::Diestro
            | Self::NeomedicaNcc3300
            | Self::Alifax
            | Self::Cbs400
            | Self::VerifyU120 => TransportKind::Serial,
            Self::Abbott | Self::Response911 | Self::Bts | Self::Unknown(_) => {
                TransportKind::Unsupported
            }
        }
    }
}

impl From<String> for DeviceType {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A15" => Self::A15,
            "BA200" => Self::Ba200,
            "BA400" => Self::Ba400,
            "ANALYX_TRIA" => Self::AnalyxTria,
            "ANALYX_PANCA" => Self::AnalyxPanca,
            "SWELAB_ALFA" => Self::SwelabAlfa,
            "SWELAB_BASIC" => Self::SwelabBasic,
            "SWELAB_LUMI" => Self::SwelabLumi,
            "NEOMEDICA_NCC_61" => Self::NeomedicaNcc61,
            "OTHER" => Self::Other,
            "WONDFO" => Self::Wondfo,
            "EDAN_H30" => Self::EdanH30,
            "EDAN_I15" => Self::EdanI15,
            "COAX" => Self::Coax,
            "DIESTRO" => Self::Diestro,
            "NEOMEDICA_NCC_3300" => Self::NeomedicaNcc3300,
            "ALIFAX" => Self::Alifax,
            "CBS400" => Self::Cbs400,
            "VERIFY_U120" | "VERIFYU120" => Self::VerifyU120,
            "ABBOTT" => Self::Abbott,
            "RESPONSE_911" => Self::Response911,
            "BTS" => Self::Bts,
            _ => Self::Unknown(raw),
        }
    }
}

impl From<DeviceType> for String {
    fn from(value: DeviceType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 设备配置快照。
///
/// 由配置提供，不可变；生命周期管理器按结构比较新旧快照判断是否需要重启。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// TCP 端口号或串口名（如 `COM3`、`/dev/ttyUSB0`）。
    pub receive_port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

fn default_baud_rate() -> u32 {
    9600
}

impl Device {
    pub fn transport_kind(&self) -> TransportKind {
        self.device_type.transport_kind()
    }
}

/// 设备服务状态。
///
/// `NoServer` 仅用于不支持的型号（占位服务，永不启动）；
/// `Stopped` / `Connect` / `Serving` 构成运行中服务的生命周期。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerState {
    NoServer,
    Stopped,
    Connect,
    Serving,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoServer => "NO_SERVER",
            Self::Stopped => "STOPPED",
            Self::Connect => "CONNECT",
            Self::Serving => "SERVING",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
