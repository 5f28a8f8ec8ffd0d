//! # HL7 v2.x 编解码边界
//!
//! 面向检验仪器的最小管道分隔编解码器，不是通用 HL7 解析器：
//! - **段树**：`RawMessage` / `Segment`，字段下标与 HL7 编号一致
//! - **转义**：`\F\ \S\ \R\ \T\ \E\`
//! - **时间戳**：TS / DTM 解析，格式错误即解码失败
//! - **类型化视图**：仅支持 ORU^R01 与 ORM^O01
//!
//! ```text
//! bytes ──PipeCodec::decode(bytes, Hl7Version)──▶ DecodedMessage::{OruR01, OrmO01}
//! RawMessage ──PipeCodec::encode──▶ bytes（段以 CR 结尾，去除末尾空字段）
//! ```

mod codec;
mod datetime;
mod error;
mod escape;
mod segment;
mod types;

pub use codec::{Hl7Codec, Hl7Version, PipeCodec};
pub use datetime::{InvalidTimestamp, format_ts, parse_ts};
pub use error::{DecodeError, EncodeError};
pub use escape::{escape, unescape};
pub use segment::{Delimiters, RawMessage, SEGMENT_TERMINATOR, Segment, component_of};
pub use types::{
    CodedElement, DecodedMessage, Msh, Obr, Obx, Orc, OrderGroup, OrderObservation, OrmO01,
    OruR01, PersonName, Pid,
};
