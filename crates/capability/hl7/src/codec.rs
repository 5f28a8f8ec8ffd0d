//! 解码 / 编码入口。

use std::fmt;

use tracing::debug;

use crate::error::{DecodeError, EncodeError};
use crate::segment::RawMessage;
use crate::types::{
    DecodedMessage, Msh, Obr, Obx, Orc, OrderGroup, OrderObservation, OrmO01, OruR01, Pid,
};

/// 解码语法版本。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hl7Version {
    V2_3_1,
    V2_5_1,
}

impl Hl7Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2_3_1 => "2.3.1",
            Self::V2_5_1 => "2.5.1",
        }
    }
}

impl fmt::Display for Hl7Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HL7 编解码边界。
pub trait Hl7Codec: Send + Sync {
    /// 按给定语法版本解码；报文自身声明的 MSH-12 不参与选择。
    fn decode(&self, bytes: &[u8], version: Hl7Version) -> Result<DecodedMessage, DecodeError>;

    fn encode(&self, message: &RawMessage) -> Result<Vec<u8>, EncodeError>;
}

/// 管道分隔文本编解码器。
#[derive(Debug, Clone, Copy, Default)]
pub struct PipeCodec;

impl PipeCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Hl7Codec for PipeCodec {
    fn decode(&self, bytes: &[u8], version: Hl7Version) -> Result<DecodedMessage, DecodeError> {
        let text =
            std::str::from_utf8(bytes).map_err(|err| DecodeError::InvalidUtf8(err.to_string()))?;
        let raw = RawMessage::parse(text)?;
        let d = raw.delimiters;
        let header = raw
            .header()
            .ok_or_else(|| DecodeError::MissingHeader(String::new()))?;
        let msh = Msh::read(header, &d)?;

        let kind = format!("{}^{}", msh.message_type, msh.trigger_event);
        debug!(
            target: "lis.hl7",
            kind = %kind,
            control_id = %msh.control_id,
            version = %version,
            segments = raw.segments.len(),
            "hl7_decode"
        );

        match (msh.message_type.as_str(), msh.trigger_event.as_str()) {
            ("ORU", "R01") => decode_oru(&raw, msh, version).map(DecodedMessage::OruR01),
            ("ORM", "O01") => decode_orm(&raw, msh).map(DecodedMessage::OrmO01),
            _ => Err(DecodeError::UnsupportedMessageType(kind)),
        }
    }

    fn encode(&self, message: &RawMessage) -> Result<Vec<u8>, EncodeError> {
        message.encode().map(String::into_bytes)
    }
}

fn decode_oru(raw: &RawMessage, msh: Msh, version: Hl7Version) -> Result<OruR01, DecodeError> {
    let d = &raw.delimiters;
    let mut message = OruR01 {
        msh,
        ..OruR01::default()
    };

    for segment in raw.segments.iter().skip(1) {
        match segment.name() {
            "PID" if message.pid.is_none() => message.pid = Some(Pid::read(segment, d)?),
            "OBR" => message.order_observations.push(OrderObservation {
                obr: Some(Obr::read(segment, d)?),
                observations: Vec::new(),
            }),
            "OBX" => {
                let obx = Obx::read(segment, d, version)?;
                match message.order_observations.last_mut() {
                    Some(group) => group.observations.push(obx),
                    None => message.order_observations.push(OrderObservation {
                        obr: None,
                        observations: vec![obx],
                    }),
                }
            }
            "NTE" => {
                let note = segment.component(3, 1, d);
                let last_obx = message
                    .order_observations
                    .last_mut()
                    .and_then(|group| group.observations.last_mut());
                if let Some(obx) = last_obx {
                    if !note.is_empty() {
                        obx.notes.push(note);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(message)
}

fn decode_orm(raw: &RawMessage, msh: Msh) -> Result<OrmO01, DecodeError> {
    let d = &raw.delimiters;
    let mut message = OrmO01 {
        msh,
        ..OrmO01::default()
    };

    for segment in raw.segments.iter().skip(1) {
        match segment.name() {
            "PID" if message.pid.is_none() => message.pid = Some(Pid::read(segment, d)?),
            "ORC" => message.orders.push(OrderGroup {
                orc: Some(Orc::read(segment, d)?),
                obr: None,
            }),
            "OBR" => {
                let obr = Obr::read(segment, d)?;
                match message.orders.last_mut() {
                    Some(group) if group.obr.is_none() => group.obr = Some(obr),
                    _ => message.orders.push(OrderGroup {
                        orc: None,
                        obr: Some(obr),
                    }),
                }
            }
            _ => {}
        }
    }

    Ok(message)
}
