//! HL7 转义序列（`\F\ \S\ \R\ \T\ \E\`）。

use crate::segment::Delimiters;

/// 将字段文本中的转义序列还原为分隔符字符。
///
/// 无法识别的转义序列（如 `\H\`、`\X0D\`）原样保留。
pub fn unescape(value: &str, delimiters: &Delimiters) -> String {
    let esc = delimiters.escape;
    if !value.contains(esc) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find(esc) {
        out.push_str(&rest[..start]);
        let after = &rest[start + esc.len_utf8()..];
        match after.find(esc) {
            Some(end) => {
                let code = &after[..end];
                match code {
                    "F" => out.push(delimiters.field),
                    "S" => out.push(delimiters.component),
                    "R" => out.push(delimiters.repetition),
                    "T" => out.push(delimiters.subcomponent),
                    "E" => out.push(esc),
                    _ => {
                        out.push(esc);
                        out.push_str(code);
                        out.push(esc);
                    }
                }
                rest = &after[end + esc.len_utf8()..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// 将分隔符字符转义，用于编码单个组件值。
pub fn escape(value: &str, delimiters: &Delimiters) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        let code = if ch == delimiters.escape {
            Some('E')
        } else if ch == delimiters.field {
            Some('F')
        } else if ch == delimiters.component {
            Some('S')
        } else if ch == delimiters.repetition {
            Some('R')
        } else if ch == delimiters.subcomponent {
            Some('T')
        } else {
            None
        };
        match code {
            Some(code) => {
                out.push(delimiters.escape);
                out.push(code);
                out.push(delimiters.escape);
            }
            None => out.push(ch),
        }
    }
    out
}
