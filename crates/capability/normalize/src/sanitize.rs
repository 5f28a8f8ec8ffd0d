//! 字节级清洗。

/// 可识别的段标签。
const SEGMENT_TAGS: [&[u8]; 6] = [b"MSH|", b"PID|", b"PV1|", b"OBR|", b"OBX|", b"ORC|"];

/// 首尾需要去除的控制字节（MLLP 起止符、NUL、换行、空格）。
const TRIM_BYTES: &[u8] = b"\x0b\x1c\x00\r\n ";

/// 清洗步骤。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeStep {
    /// 去除首尾控制字节，字面量 `\n` 转为换行，删除 NUL
    TrimControl,
    /// 仅保留可打印 ASCII（及 CR / LF）
    PrintableOnly,
    /// 在未被段分隔符隔开的段标签前插入 CR
    SplitSegments,
}

/// 依次执行清洗步骤，最后统一段分隔符。
///
/// 统一步骤总会执行：CRLF / LF / CR 统一为 CR，去除空段与段首尾空白。
pub fn sanitize(input: &[u8], steps: &[SanitizeStep]) -> Vec<u8> {
    let mut bytes = input.to_vec();
    for step in steps {
        bytes = match step {
            SanitizeStep::TrimControl => trim_control(&bytes),
            SanitizeStep::PrintableOnly => printable_only(&bytes),
            SanitizeStep::SplitSegments => split_segments(&bytes),
        };
    }
    unify_segments(&bytes)
}

fn trim_control(bytes: &[u8]) -> Vec<u8> {
    let start = bytes
        .iter()
        .position(|b| !TRIM_BYTES.contains(b))
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !TRIM_BYTES.contains(b))
        .map(|idx| idx + 1)
        .unwrap_or(start);
    let trimmed = &bytes[start..end.max(start)];

    let mut out = Vec::with_capacity(trimmed.len());
    let mut idx = 0;
    while idx < trimmed.len() {
        match trimmed[idx] {
            b'\\' if trimmed.get(idx + 1) == Some(&b'n') => {
                out.push(b'\n');
                idx += 2;
            }
            0 => idx += 1,
            byte => {
                out.push(byte);
                idx += 1;
            }
        }
    }
    out
}

fn printable_only(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .copied()
        .filter(|b| (32..=126).contains(b) || *b == b'\r' || *b == b'\n')
        .collect()
}

fn split_segments(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 16);
    for (idx, byte) in bytes.iter().enumerate() {
        let at_tag = SEGMENT_TAGS.iter().any(|tag| bytes[idx..].starts_with(tag));
        let separated = idx == 0 || matches!(bytes[idx - 1], b'\r' | b'\n');
        if at_tag && !separated {
            out.push(b'\r');
        }
        out.push(*byte);
    }
    out
}

fn unify_segments(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    for line in bytes.split(|b| *b == b'\r' || *b == b'\n') {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        out.extend_from_slice(line);
        out.push(b'\r');
    }
    out
}
