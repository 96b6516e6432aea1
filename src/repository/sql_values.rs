// ==========================================
// 尾程运价引擎 - 存储值编解码
// ==========================================
// 职责: 金额（TEXT）、日期（YYYY-MM-DD）、时间戳（RFC3339）、枚举的读写转换
// 约定: 存储值不可解码时返回 FromSqlConversionFailure → RepositoryError::FieldValueError
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

/// 金额写入文本（规范化去尾零）
pub fn decimal_to_text(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}

pub fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => Decimal::from_str(text.trim())
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("金额 '{}' 无法解析: {}", text, e))),
    }
}

pub fn required_decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    decimal_column(row, idx)?.ok_or_else(|| conversion_error(idx, "金额为空".to_string()))
}

pub fn date_to_text(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| conversion_error(idx, format!("日期 '{}' 无法解析: {}", text, e)))
}

pub fn optional_date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("日期 '{}' 无法解析: {}", text, e))),
    }
}

pub fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("时间戳 '{}' 无法解析: {}", text, e)))
}

/// 按枚举的 parse 函数解码文本列
pub fn enum_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(text.trim()).ok_or_else(|| conversion_error(idx, format!("未知枚举值 '{}'", text)))
}

/// JSON 文本列解码为字符串列表
pub fn json_list_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: Option<String> = row.get(idx)?;
    match text {
        None => Ok(Vec::new()),
        Some(t) if t.trim().is_empty() => Ok(Vec::new()),
        Some(t) => serde_json::from_str::<Vec<String>>(&t)
            .map_err(|e| conversion_error(idx, format!("JSON 列表 '{}' 无法解析: {}", t, e))),
    }
}
