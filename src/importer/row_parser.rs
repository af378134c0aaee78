// ==========================================
// 试验台遥测系统 - CSV 行解析与校验
// ==========================================
// 职责: 输入解码、表头校验、逐行解析时间戳与六个测量列
// 规则: 表头去空白并转小写后比较，多余列忽略
//       单元格为空 → 跳过该测量量；非空但非数值 → 整行失败（遇错即止）
// ==========================================

use crate::domain::catalog::CANONICAL_QUANTITIES;
use crate::importer::error::{ImportError, ImportResult};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use thiserror::Error;

/// 必需列（时间戳 + 六个测量列）
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "ts",
    "throttle",
    "temperature",
    "humidity",
    "rpm",
    "noise",
    "thrust",
];

const TS_COLUMN: &str = "ts";

const UTF8_BOM: &str = "\u{feff}";

// 带偏移量的时间格式（'Z' 先替换为 +00:00）
const OFFSET_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

// ==========================================
// 输入解码
// ==========================================

/// 将上传内容解码为 UTF-8 文本（去除 BOM）
pub fn decode_input(bytes: &[u8]) -> ImportResult<&str> {
    let text = std::str::from_utf8(bytes).map_err(|e| ImportError::Encoding(e.to_string()))?;
    Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text))
}

/// 构造 CSV 读取器（首行为表头，允许行长度不一致）
pub fn csv_reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes())
}

// ==========================================
// 时间戳解析
// ==========================================

/// 解析 ISO-8601 风格时间戳
///
/// 带偏移量的值按其偏移量换算为 UTC；不带偏移量的值按 naive_offset 解释。
/// 仅有日期时取当日零点。
pub fn parse_timestamp(raw: &str, naive_offset: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim().to_ascii_uppercase();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let with_offset = match raw.strip_suffix('Z') {
        Some(head) => format!("{head}+00:00"),
        None => expand_hour_offset(&raw).unwrap_or_else(|| raw.clone()),
    };
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&with_offset, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    naive_offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// 仅含小时的偏移量（`+03`）补全为 `+03:00`
fn expand_hour_offset(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let split = bytes.len().checked_sub(3)?;
    let (head, tail) = bytes.split_at(split);
    let hour_only = matches!(tail[0], b'+' | b'-') && tail[1..].iter().all(u8::is_ascii_digit);
    // 时间部分必须存在，避免把日期里的 "-05" 当作偏移量
    if hour_only && head.contains(&b':') {
        Some(format!("{raw}:00"))
    } else {
        None
    }
}

// ==========================================
// 行级错误
// ==========================================

/// 行级解析失败原因（只计数，不中断导入）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("时间戳为空")]
    MissingTimestamp,

    #[error("时间戳无法解析: {0}")]
    InvalidTimestamp(String),

    #[error("数值无法解析 (列 {column}): {value}")]
    InvalidNumber { column: &'static str, value: String },

    #[error("该行没有任何测量值")]
    NoValues,
}

/// 解析成功的一行
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub ts: DateTime<Utc>,
    /// (测量量键, 数值)，按规范列顺序
    pub values: Vec<(&'static str, f64)>,
}

// ==========================================
// RowParser - 行解析器
// ==========================================
#[derive(Debug, Clone)]
pub struct RowParser {
    ts_index: usize,
    quantity_columns: Vec<(&'static str, usize)>,
    naive_offset: FixedOffset,
}

impl RowParser {
    /// 校验表头并建立列索引
    ///
    /// # 错误
    /// - EmptyFile: 没有表头
    /// - MissingColumns: 缺少必需列（按字母序，以 ", " 连接）
    pub fn from_headers(headers: &StringRecord, naive_offset: FixedOffset) -> ImportResult<Self> {
        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ImportError::EmptyFile);
        }

        // 重复列名以最后一个为准
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_lowercase(), idx))
            .collect();

        let mut missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| !index.contains_key(*col))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            return Err(ImportError::MissingColumns(missing.join(", ")));
        }

        let ts_index = index[TS_COLUMN];
        let quantity_columns = CANONICAL_QUANTITIES
            .iter()
            .map(|q| (q.key, index[q.key]))
            .collect();

        Ok(Self {
            ts_index,
            quantity_columns,
            naive_offset,
        })
    }

    fn cell(record: &StringRecord, idx: usize) -> String {
        record.get(idx).unwrap_or("").trim().to_lowercase()
    }

    /// 解析时间戳列
    pub fn parse_ts(&self, record: &StringRecord) -> Result<DateTime<Utc>, RowError> {
        let raw_ts = Self::cell(record, self.ts_index);
        if raw_ts.is_empty() {
            return Err(RowError::MissingTimestamp);
        }
        parse_timestamp(&raw_ts, self.naive_offset).ok_or(RowError::InvalidTimestamp(raw_ts))
    }

    /// 按规范列顺序逐个解析测量值
    ///
    /// 空单元格不产出；非数值单元格产出 Err，调用方应在此处停止（遇错即止）
    pub fn values<'r>(
        &'r self,
        record: &'r StringRecord,
    ) -> impl Iterator<Item = Result<(&'static str, f64), RowError>> + 'r {
        self.quantity_columns.iter().filter_map(move |&(column, idx)| {
            let raw = Self::cell(record, idx);
            if raw.is_empty() {
                return None;
            }
            Some(match raw.parse::<f64>() {
                Ok(value) => Ok((column, value)),
                Err(_) => Err(RowError::InvalidNumber { column, value: raw }),
            })
        })
    }

    /// 解析一行数据
    pub fn parse_row(&self, record: &StringRecord) -> Result<ParsedRow, RowError> {
        let ts = self.parse_ts(record)?;
        let values = self.values(record).collect::<Result<Vec<_>, _>>()?;

        if values.is_empty() {
            return Err(RowError::NoValues);
        }
        Ok(ParsedRow { ts, values })
    }
}
