//! 仪器报文清洗与字段修正。
//!
//! 解码之前执行：字节级清洗 → 结构修正 → 字段修正。

mod rules;
mod sanitize;

pub use rules::{CaretEscape, FieldAction, QuirkRule, RuleSet, StructuralRule};
pub use sanitize::{SanitizeStep, sanitize};

use chrono::NaiveDateTime;

/// 单个设备族的清洗器。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalizer {
    steps: Vec<SanitizeStep>,
    rules: RuleSet,
}

impl Normalizer {
    pub fn new(steps: Vec<SanitizeStep>, rules: RuleSet) -> Self {
        Self { steps, rules }
    }

    pub fn normalize(&self, raw: &[u8]) -> Vec<u8> {
        self.normalize_at(raw, chrono::Local::now().naive_local())
    }

    /// 以给定时间执行清洗（占位 OBR 使用该时间）。
    ///
    /// 非 UTF-8 报文跳过规则表，交由解码阶段拒绝。
    pub fn normalize_at(&self, raw: &[u8], now: NaiveDateTime) -> Vec<u8> {
        let sanitized = sanitize(raw, &self.steps);
        if self.rules.is_empty() {
            return sanitized;
        }
        match std::str::from_utf8(&sanitized) {
            Ok(text) => self.rules.apply(text, now).into_bytes(),
            Err(_) => sanitized,
        }
    }
}
