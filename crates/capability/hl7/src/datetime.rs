//! HL7 TS / DTM 时间戳解析与格式化。
//!
//! 格式：`YYYY[MM[DD[HH[MM[SS[.S[S[S[S]]]]]]]]][+/-ZZZZ]`，时区偏移被忽略（按本地时间处理）。

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// 时间戳格式非法
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp")]
pub struct InvalidTimestamp;

/// 解析时间戳；空字符串返回 `Ok(None)`。
pub fn parse_ts(value: &str) -> Result<Option<NaiveDateTime>, InvalidTimestamp> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let body = match value.find(['+', '-']) {
        Some(idx) => {
            let offset = &value[idx + 1..];
            if offset.len() != 4 || !offset.bytes().all(|b| b.is_ascii_digit()) {
                return Err(InvalidTimestamp);
            }
            &value[..idx]
        }
        None => value,
    };

    let (digits, fraction) = match body.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (body, None),
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidTimestamp);
    }
    if !matches!(digits.len(), 4 | 6 | 8 | 10 | 12 | 14) {
        return Err(InvalidTimestamp);
    }
    if let Some(fraction) = fraction {
        if digits.len() != 14
            || fraction.is_empty()
            || fraction.len() > 4
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(InvalidTimestamp);
        }
    }

    let number = |range: std::ops::Range<usize>, default: u32| -> Result<u32, InvalidTimestamp> {
        match digits.get(range) {
            Some(part) => part.parse::<u32>().map_err(|_| InvalidTimestamp),
            None => Ok(default),
        }
    };

    let year = digits[0..4].parse::<i32>().map_err(|_| InvalidTimestamp)?;
    let month = number(4..6, 1)?;
    let day = number(6..8, 1)?;
    let hour = number(8..10, 0)?;
    let minute = number(10..12, 0)?;
    let second = number(12..14, 0)?;
    let millis = match fraction {
        Some(fraction) => {
            let padded = format!("{fraction:0<4}");
            padded.parse::<u32>().map_err(|_| InvalidTimestamp)? / 10
        }
        None => 0,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(InvalidTimestamp)?;
    let time = NaiveTime::from_hms_milli_opt(hour, minute, second, millis).ok_or(InvalidTimestamp)?;
    Ok(Some(NaiveDateTime::new(date, time)))
}

/// 格式化为 14 位时间戳（`yyyyMMddHHmmss`）。
pub fn format_ts(value: &NaiveDateTime) -> String {
    value.format("%Y%m%d%H%M%S").to_string()
}
