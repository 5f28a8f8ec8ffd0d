//! 标本条码优先级链。

use lis_hl7::{Delimiters, Obr, Pid};

/// 无效占位值。
const PLACEHOLDERS: [&str; 2] = ["", "0"];

/// 条码候选来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarcodeSource {
    /// PID-3 每个重复的第一个组件
    PidIdentifiers,
    /// PID-2
    PidPatientId,
    /// PID-5 姓
    PidFamilyName,
    /// PID-5 姓、名依次
    PidNames,
    /// PID-3 所有重复的所有组件
    PidIdentifierComponents,
    /// PID-3 中不含组件分隔符的重复
    PidSimpleIdentifiers,
    /// OBR-3
    ObrFiller,
    /// OBR-2
    ObrPlacer,
    /// OBR-4.1
    ObrUniversalService,
}

impl BarcodeSource {
    fn candidates(&self, pid: Option<&Pid>, obr: Option<&Obr>, d: &Delimiters) -> Vec<String> {
        match self {
            Self::PidIdentifiers => pid.map(|p| p.identifiers.clone()).unwrap_or_default(),
            Self::PidPatientId => pid.map(|p| vec![p.patient_id.clone()]).unwrap_or_default(),
            Self::PidFamilyName => pid
                .and_then(|p| p.names.first())
                .map(|name| vec![name.family.clone()])
                .unwrap_or_default(),
            Self::PidNames => pid
                .map(|p| {
                    p.names
                        .iter()
                        .flat_map(|name| [name.family.clone(), name.given.clone()])
                        .collect()
                })
                .unwrap_or_default(),
            Self::PidIdentifierComponents => pid
                .map(|p| {
                    p.identifier_repetitions
                        .iter()
                        .flat_map(|rep| rep.split(d.component))
                        .map(|part| lis_hl7::unescape(part, d))
                        .collect()
                })
                .unwrap_or_default(),
            Self::PidSimpleIdentifiers => pid
                .map(|p| {
                    p.identifier_repetitions
                        .iter()
                        .filter(|rep| !rep.contains(d.component))
                        .map(|rep| lis_hl7::unescape(rep, d))
                        .collect()
                })
                .unwrap_or_default(),
            Self::ObrFiller => obr
                .map(|o| vec![o.filler_order_number.clone()])
                .unwrap_or_default(),
            Self::ObrPlacer => obr
                .map(|o| vec![o.placer_order_number.clone()])
                .unwrap_or_default(),
            Self::ObrUniversalService => obr
                .map(|o| vec![o.universal_service.identifier.clone()])
                .unwrap_or_default(),
        }
    }
}

/// 一个设备族的条码解析策略。
///
/// `prefixes` 非空时，`preferred` 中只接受带已知前缀的候选；
/// 都不满足时再按 `fallback` 取第一个有效值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarcodePolicy {
    pub preferred: Vec<BarcodeSource>,
    pub prefixes: &'static [&'static str],
    pub fallback: Vec<BarcodeSource>,
}

impl BarcodePolicy {
    /// PID-3 → PID-2 → OBR-3 → OBR-2
    pub fn standard() -> Self {
        Self {
            preferred: vec![
                BarcodeSource::PidIdentifiers,
                BarcodeSource::PidPatientId,
                BarcodeSource::ObrFiller,
                BarcodeSource::ObrPlacer,
            ],
            prefixes: &[],
            fallback: Vec::new(),
        }
    }

    /// 解析条码；没有任何有效候选时返回空串。
    pub fn resolve(&self, pid: Option<&Pid>, obr: Option<&Obr>, d: &Delimiters) -> String {
        let accepted = |candidate: &String| {
            let trimmed = candidate.trim();
            !PLACEHOLDERS.contains(&trimmed)
                && (self.prefixes.is_empty()
                    || self.prefixes.iter().any(|prefix| trimmed.starts_with(prefix)))
        };
        let preferred = self
            .preferred
            .iter()
            .flat_map(|source| source.candidates(pid, obr, d))
            .find(accepted);
        if let Some(barcode) = preferred {
            return barcode.trim().to_string();
        }
        self.fallback
            .iter()
            .flat_map(|source| source.candidates(pid, obr, d))
            .find(|candidate| !PLACEHOLDERS.contains(&candidate.trim()))
            .map(|barcode| barcode.trim().to_string())
            .unwrap_or_default()
    }
}
