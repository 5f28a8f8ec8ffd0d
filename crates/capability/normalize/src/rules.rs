//! 字段修正与结构修正规则。
//!
//! 每条规则都是幂等的：对同一报文执行两次与执行一次结果相同。

use chrono::NaiveDateTime;
use lis_hl7::{Delimiters, RawMessage, Segment, format_ts};
use tracing::debug;

/// 插入符 `^` 的改写方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretEscape {
    /// `^` → `\S\`
    Formal,
    /// 数值区间 `136^145` → `136-145`，其余 `^` → `-`
    Hyphen,
}

/// 字段修正动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAction {
    /// 非纯数字或长度不在 4/6/8/12/14 时清空
    ClearIfInvalidDateTime,
    /// 不以前缀开头或含字母时清空
    ClearUnlessPrefix(&'static str),
    ClearIfEquals(&'static str),
    ClearUnlessOneOf(&'static [&'static str]),
    EscapeCaret(CaretEscape),
    /// `\\S\\`、`\S\` → `e`，去除残留反斜杠
    NormalizeUnits,
    Clear,
}

impl FieldAction {
    /// 对单个原始字段求值；返回 `None` 表示不需要改写。
    pub fn rewrite(&self, value: &str, delimiters: &Delimiters) -> Option<String> {
        let rewritten = match self {
            Self::ClearIfInvalidDateTime => {
                let trimmed = value.trim();
                let valid = trimmed.bytes().all(|b| b.is_ascii_digit())
                    && matches!(trimmed.len(), 4 | 6 | 8 | 12 | 14);
                if trimmed.is_empty() || valid {
                    return None;
                }
                String::new()
            }
            Self::ClearUnlessPrefix(prefix) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let has_letters = trimmed.chars().any(char::is_alphabetic);
                if trimmed.starts_with(prefix) && !has_letters {
                    return None;
                }
                String::new()
            }
            Self::ClearIfEquals(expected) => {
                if value.trim() != *expected {
                    return None;
                }
                String::new()
            }
            Self::ClearUnlessOneOf(allowed) => {
                let trimmed = value.trim();
                if trimmed.is_empty() || allowed.contains(&trimmed) {
                    return None;
                }
                String::new()
            }
            Self::EscapeCaret(mode) => {
                let caret = delimiters.component;
                if !value.contains(caret) {
                    return None;
                }
                match mode {
                    CaretEscape::Formal => {
                        let escaped = format!("{esc}S{esc}", esc = delimiters.escape);
                        value.replace(caret, &escaped)
                    }
                    CaretEscape::Hyphen => hyphenate(value.trim(), caret),
                }
            }
            Self::NormalizeUnits => {
                let esc = delimiters.escape;
                let doubled = format!("{esc}{esc}S{esc}{esc}");
                let single = format!("{esc}S{esc}");
                value
                    .replace(&doubled, "e")
                    .replace(&single, "e")
                    .replace(esc, "")
            }
            Self::Clear => String::new(),
        };
        (rewritten != value).then_some(rewritten)
    }
}

fn hyphenate(value: &str, caret: char) -> String {
    let parts: Vec<&str> = value.split(caret).collect();
    let numeric = |part: &str| {
        let part = part.trim();
        !part.is_empty() && part.parse::<f64>().is_ok()
    };
    if parts.len() == 2 && numeric(parts[0]) && numeric(parts[1]) {
        return format!("{}-{}", parts[0].trim(), parts[1].trim());
    }
    value.replace(caret, "-")
}

/// 针对某段某字段的修正规则。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuirkRule {
    pub segment: &'static str,
    pub field: usize,
    pub action: FieldAction,
}

impl QuirkRule {
    pub const fn new(segment: &'static str, field: usize, action: FieldAction) -> Self {
        Self {
            segment,
            field,
            action,
        }
    }
}

/// 段级结构修正。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralRule {
    /// 仅保留列出的段
    KeepSegments(&'static [&'static str]),
    /// 丢弃直方图负载行，OBX 集合 ID 依次重编号
    RenumberObx,
    /// 第一个 PID 之后缺少 PV1 时插入
    EnsurePv1AfterPid,
    /// 没有任何 OBR 时，在第一个 OBX 前插入占位 OBR（OBR-3 取 PID-2）
    EnsureObrBeforeObx,
}

/// 一个设备族的完整规则表。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub structural: Vec<StructuralRule>,
    pub fields: Vec<QuirkRule>,
}

impl RuleSet {
    pub fn is_empty(&self) -> bool {
        self.structural.is_empty() && self.fields.is_empty()
    }

    /// 先执行结构修正，再执行字段修正。
    pub fn apply(&self, text: &str, now: NaiveDateTime) -> String {
        let mut message = RawMessage::split(text);
        for rule in &self.structural {
            apply_structural(&mut message, *rule, now);
        }
        let delimiters = message.delimiters;
        for segment in message.segments.iter_mut() {
            for rule in &self.fields {
                if !segment.is(rule.segment) {
                    continue;
                }
                let original = segment.field(rule.field);
                if let Some(rewritten) = rule.action.rewrite(original, &delimiters) {
                    debug!(
                        target: "lis.normalize",
                        segment = rule.segment,
                        field = rule.field,
                        original = %original,
                        normalized = %rewritten,
                        "quirk_rewrite"
                    );
                    lis_telemetry::record_quirk_rewrite();
                    segment.set_field(rule.field, rewritten);
                }
            }
        }
        message.render()
    }
}

fn apply_structural(message: &mut RawMessage, rule: StructuralRule, now: NaiveDateTime) {
    match rule {
        StructuralRule::KeepSegments(names) => {
            message
                .segments
                .retain(|segment| names.contains(&segment.name()));
        }
        StructuralRule::RenumberObx => {
            message.segments.retain(|segment| {
                !(segment.is("OBX") && segment.field(3).contains("Histogram"))
            });
            let mut counter = 0usize;
            for segment in message.segments.iter_mut().filter(|s| s.is("OBX")) {
                counter += 1;
                segment.set_field(1, counter.to_string());
            }
        }
        StructuralRule::EnsurePv1AfterPid => {
            let Some(pid_index) = message.segments.iter().position(|s| s.is("PID")) else {
                return;
            };
            let has_pv1 = message
                .segments
                .get(pid_index + 1)
                .is_some_and(|next| next.is("PV1"));
            if !has_pv1 {
                let mut pv1 = Segment::new("PV1");
                pv1.set_field(1, "1");
                message.insert(pid_index + 1, pv1);
            }
        }
        StructuralRule::EnsureObrBeforeObx => {
            if message.segments.iter().any(|s| s.is("OBR")) {
                return;
            }
            let Some(obx_index) = message.segments.iter().position(|s| s.is("OBX")) else {
                return;
            };
            let filler = message
                .segments
                .iter()
                .find(|s| s.is("PID"))
                .map(|pid| pid.field(2).to_string())
                .unwrap_or_default();
            let delimiters = message.delimiters;
            let mut obr = Segment::new("OBR");
            obr.set_field(1, "1");
            obr.set_field(3, filler);
            obr.set_components(4, &["CBC", "Complete Blood Count"], &delimiters);
            obr.set_field(7, format_ts(&now));
            message.insert(obx_index, obr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d() -> Delimiters {
        Delimiters::default()
    }

    #[test]
    fn datetime_rule_keeps_valid_precisions() {
        let action = FieldAction::ClearIfInvalidDateTime;
        assert_eq!(action.rewrite("20250101", &d()), None);
        assert_eq!(action.rewrite("202501011230", &d()), None);
        assert_eq!(action.rewrite("", &d()), None);
        assert_eq!(action.rewrite("1", &d()), Some(String::new()));
        assert_eq!(action.rewrite("2025010112", &d()), Some(String::new()));
    }

    #[test]
    fn prefix_rule_clears_non_dates() {
        let action = FieldAction::ClearUnlessPrefix("20");
        assert_eq!(action.rewrite("20250101101010", &d()), None);
        assert_eq!(action.rewrite("19991231", &d()), Some(String::new()));
        assert_eq!(action.rewrite("20AB", &d()), Some(String::new()));
    }

    #[test]
    fn caret_escapes() {
        let formal = FieldAction::EscapeCaret(CaretEscape::Formal);
        assert_eq!(
            formal.rewrite("3.5^5.5", &d()),
            Some(r"3.5\S\5.5".to_string())
        );
        assert_eq!(formal.rewrite(r"3.5\S\5.5", &d()), None);

        let hyphen = FieldAction::EscapeCaret(CaretEscape::Hyphen);
        assert_eq!(hyphen.rewrite("136^145", &d()), Some("136-145".to_string()));
        assert_eq!(hyphen.rewrite(" 1 ^ 2 ", &d()), Some("1-2".to_string()));
        assert_eq!(hyphen.rewrite("neg^pos^x", &d()), Some("neg-pos-x".to_string()));
    }

    #[test]
    fn unit_normalization() {
        let action = FieldAction::NormalizeUnits;
        assert_eq!(action.rewrite(r"10\S\9/L", &d()), Some("10e9/L".to_string()));
        assert_eq!(
            action.rewrite(r"10\\S\\12/L", &d()),
            Some("10e12/L".to_string())
        );
        assert_eq!(action.rewrite("g/dL", &d()), None);
    }

    #[test]
    fn sex_rule_accepts_table_values() {
        let action = FieldAction::ClearUnlessOneOf(&["M", "F", "O", "U", "A", "N"]);
        assert_eq!(action.rewrite("F", &d()), None);
        assert_eq!(action.rewrite("1", &d()), Some(String::new()));
        assert_eq!(action.rewrite("", &d()), None);
    }
}
