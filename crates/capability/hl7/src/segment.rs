//! 管道分隔的段树：报文 → 段 → 字段（重复 / 组件按需切分）。
//!
//! 字段下标与 HL7 编号一致：`PID-3` 即 `segment.field(3)`；
//! MSH 段中 `field(1)` 为字段分隔符本身，`field(2)` 为编码字符。

use crate::error::{DecodeError, EncodeError};
use crate::escape::{escape, unescape};

/// 段分隔符（回车）。
pub const SEGMENT_TERMINATOR: char = '\r';

/// 分隔符集合（MSH-1 + MSH-2）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Delimiters {
    /// 从 MSH 行读取分隔符。
    pub fn from_header(line: &str) -> Result<Self, DecodeError> {
        let mut chars = line.chars();
        let name: String = chars.by_ref().take(3).collect();
        if name != "MSH" {
            return Err(DecodeError::MissingHeader(name));
        }
        let field = chars
            .next()
            .ok_or_else(|| DecodeError::InvalidEncodingCharacters(line.to_string()))?;
        let encoding: String = chars.take_while(|ch| *ch != field).collect();
        let encoding_chars: Vec<char> = encoding.chars().collect();
        // 2.7 起允许第 5 个截断字符，这里只取前 4 个
        if !(4..=5).contains(&encoding_chars.len()) {
            return Err(DecodeError::InvalidEncodingCharacters(encoding));
        }

        let delimiters = Self {
            field,
            component: encoding_chars[0],
            repetition: encoding_chars[1],
            escape: encoding_chars[2],
            subcomponent: encoding_chars[3],
        };
        if !delimiters.is_valid() {
            return Err(DecodeError::InvalidEncodingCharacters(encoding));
        }
        Ok(delimiters)
    }

    /// MSH-2 编码字符。
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }

    fn is_valid(&self) -> bool {
        let all = [
            self.field,
            self.component,
            self.repetition,
            self.escape,
            self.subcomponent,
        ];
        let distinct = all
            .iter()
            .enumerate()
            .all(|(i, ch)| !all[..i].contains(ch));
        distinct
            && all
                .iter()
                .all(|ch| !ch.is_alphanumeric() && !ch.is_whitespace() && !ch.is_control())
    }
}

/// 单个段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    fields: Vec<String>,
}

impl Segment {
    /// 创建空段（仅段名）。
    pub fn new(name: &str) -> Self {
        Self {
            fields: vec![name.to_string()],
        }
    }

    /// 创建 MSH 段，预填 MSH-1 / MSH-2。
    pub fn header(delimiters: &Delimiters) -> Self {
        Self {
            fields: vec![
                "MSH".to_string(),
                delimiters.field.to_string(),
                delimiters.encoding_characters(),
            ],
        }
    }

    /// 按分隔符切分一行。
    pub fn parse(line: &str, delimiters: &Delimiters) -> Self {
        let sep = delimiters.field;
        if line.starts_with("MSH") && line[3..].starts_with(sep) {
            let rest = &line[3 + sep.len_utf8()..];
            let mut fields = vec!["MSH".to_string(), sep.to_string()];
            fields.extend(rest.split(sep).map(str::to_string));
            return Self { fields };
        }
        Self {
            fields: line.split(sep).map(str::to_string).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.fields[0]
    }

    pub fn is(&self, name: &str) -> bool {
        self.name() == name
    }

    /// 最大字段编号。
    pub fn len(&self) -> usize {
        self.fields.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 原始字段文本（未还原转义），缺失时为空串。
    pub fn field(&self, index: usize) -> &str {
        if index == 0 {
            return "";
        }
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    /// 设置原始字段文本，必要时补齐中间空字段。
    pub fn set_field(&mut self, index: usize, value: impl Into<String>) {
        if index == 0 {
            return;
        }
        if self.fields.len() <= index {
            self.fields.resize(index + 1, String::new());
        }
        self.fields[index] = value.into();
    }

    /// 逐组件转义后写入字段，末尾空组件被去除。
    pub fn set_components(&mut self, index: usize, components: &[&str], delimiters: &Delimiters) {
        let mut parts: Vec<String> = components
            .iter()
            .map(|component| escape(component, delimiters))
            .collect();
        while parts.last().is_some_and(String::is_empty) {
            parts.pop();
        }
        let sep = delimiters.component.to_string();
        self.set_field(index, parts.join(&sep));
    }

    /// 字段的各个重复（原始文本）。
    pub fn repetitions<'a>(
        &'a self,
        index: usize,
        delimiters: &Delimiters,
    ) -> impl Iterator<Item = &'a str> + 'a {
        let raw = self.field(index);
        let sep = delimiters.repetition;
        raw.split(sep).filter(move |_| !raw.is_empty())
    }

    /// 第一个重复中第 `component` 个组件（从 1 开始），已还原转义。
    pub fn component(&self, index: usize, component: usize, delimiters: &Delimiters) -> String {
        let first = self.repetitions(index, delimiters).next().unwrap_or("");
        component_of(first, component, delimiters)
    }

    /// 按原始文本编码，去除末尾空字段。
    pub fn encode(&self, delimiters: &Delimiters) -> String {
        let mut end = self.fields.len();
        let min = if self.is("MSH") { 3 } else { 1 };
        while end > min && self.fields[end - 1].is_empty() {
            end -= 1;
        }
        let sep = delimiters.field.to_string();
        if self.is("MSH") && end >= 2 {
            let mut out = String::from("MSH");
            out.push(delimiters.field);
            out.push_str(&self.fields[2..end].join(&sep));
            return out;
        }
        self.fields[..end].join(&sep)
    }
}

/// 取一个重复中的第 `component` 个组件（从 1 开始）并还原转义。
pub fn component_of(repetition: &str, component: usize, delimiters: &Delimiters) -> String {
    if component == 0 {
        return String::new();
    }
    repetition
        .split(delimiters.component)
        .nth(component - 1)
        .map(|value| {
            let first_sub = value.split(delimiters.subcomponent).next().unwrap_or("");
            unescape(first_sub, delimiters)
        })
        .unwrap_or_default()
}

/// 段序列及其分隔符。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub delimiters: Delimiters,
    pub segments: Vec<Segment>,
}

impl RawMessage {
    pub fn new(delimiters: Delimiters) -> Self {
        Self {
            delimiters,
            segments: Vec::new(),
        }
    }

    /// 宽松切分：接受 CR / LF / CRLF 作为段分隔，丢弃空行；
    /// 分隔符取自第一个合法的 MSH 行，否则使用默认值。
    pub fn split(text: &str) -> Self {
        let lines: Vec<&str> = text
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let delimiters = lines
            .iter()
            .find(|line| line.starts_with("MSH"))
            .and_then(|line| Delimiters::from_header(line).ok())
            .unwrap_or_default();
        let segments = lines
            .iter()
            .map(|line| Segment::parse(line, &delimiters))
            .collect();
        Self {
            delimiters,
            segments,
        }
    }

    /// 严格切分：首段必须是 MSH 且编码字符合法。
    pub fn parse(text: &str) -> Result<Self, DecodeError> {
        let first = text
            .split(['\r', '\n'])
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or(DecodeError::Empty)?;
        Delimiters::from_header(first)?;
        Ok(Self::split(text))
    }

    pub fn header(&self) -> Option<&Segment> {
        self.segments.first().filter(|segment| segment.is("MSH"))
    }

    pub fn segments_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments.iter().filter(move |segment| segment.is(name))
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// 编码为以 CR 结尾的段序列。
    pub fn encode(&self) -> Result<String, EncodeError> {
        if self.header().is_none() {
            return Err(EncodeError::MissingHeader);
        }
        for segment in &self.segments {
            let name = segment.name();
            let valid_name = name.len() == 3
                && name
                    .chars()
                    .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit());
            if !valid_name {
                return Err(EncodeError::InvalidSegmentName(name.to_string()));
            }
        }
        Ok(self.render())
    }

    /// 不做结构校验的文本输出（清洗阶段使用）。
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(&segment.encode(&self.delimiters));
            out.push(SEGMENT_TERMINATOR);
        }
        out
    }

    /// 在指定位置插入段。
    pub fn insert(&mut self, index: usize, segment: Segment) {
        let index = index.min(self.segments.len());
        self.segments.insert(index, segment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_follow_hl7_numbering() {
        let delimiters = Delimiters::default();
        let msh = Segment::parse(r"MSH|^~\&|LAB|FAC|||20250610||ORU^R01|391|P|2.3.1", &delimiters);
        assert_eq!(msh.field(1), "|");
        assert_eq!(msh.field(2), r"^~\&");
        assert_eq!(msh.field(3), "LAB");
        assert_eq!(msh.field(10), "391");
        assert_eq!(msh.component(9, 2, &delimiters), "R01");
    }

    #[test]
    fn component_and_repetition_access() {
        let delimiters = Delimiters::default();
        let pid = Segment::parse("PID|1|P2|ID1^^^HOSP~ID2||Doe^John", &delimiters);
        let ids: Vec<&str> = pid.repetitions(3, &delimiters).collect();
        assert_eq!(ids, vec!["ID1^^^HOSP", "ID2"]);
        assert_eq!(pid.component(5, 1, &delimiters), "Doe");
        assert_eq!(pid.component(5, 2, &delimiters), "John");
        assert_eq!(pid.component(5, 3, &delimiters), "");
        assert_eq!(pid.repetitions(4, &delimiters).count(), 0);
    }

    #[test]
    fn encode_trims_trailing_empty_fields() {
        let delimiters = Delimiters::default();
        let mut msa = Segment::new("MSA");
        msa.set_field(1, "AA");
        msa.set_field(2, "391");
        msa.set_field(6, "");
        assert_eq!(msa.encode(&delimiters), "MSA|AA|391");

        let msh = Segment::parse(r"MSH|^~\&|A||||", &delimiters);
        assert_eq!(msh.encode(&delimiters), r"MSH|^~\&|A");
    }

    #[test]
    fn set_components_escapes_values() {
        let delimiters = Delimiters::default();
        let mut obr = Segment::new("OBR");
        obr.set_components(4, &["CBC", "Complete Blood Count", ""], &delimiters);
        assert_eq!(obr.field(4), "CBC^Complete Blood Count");
        obr.set_components(5, &["a^b"], &delimiters);
        assert_eq!(obr.field(5), r"a\S\b");
    }

    #[test]
    fn delimiters_reject_invalid_encoding_characters() {
        assert!(Delimiters::from_header(r"MSH|^~\&|").is_ok());
        assert!(matches!(
            Delimiters::from_header("MSH|^~|"),
            Err(DecodeError::InvalidEncodingCharacters(_))
        ));
        assert!(matches!(
            Delimiters::from_header("MSH|^^^^|"),
            Err(DecodeError::InvalidEncodingCharacters(_))
        ));
        assert!(matches!(
            Delimiters::from_header("PID|1"),
            Err(DecodeError::MissingHeader(_))
        ));
    }

    #[test]
    fn split_is_lenient_about_line_endings() {
        let message = RawMessage::split("junk\nMSH|^~\\&|A\r\nPID|1\r\r");
        assert_eq!(message.segments.len(), 3);
        assert!(message.header().is_none());
        assert!(RawMessage::parse("junk\rMSH|^~\\&|A").is_err());
    }
}
