// ==========================================
// 尾程运价引擎 - 原始表格与版式识别模型
// ==========================================
// 职责: 上传文件解析后的矩形单元格矩阵、版式识别结果、列映射结果
// 生命周期: 每次上传新建，不可变
// ==========================================

use crate::domain::types::{ColumnRole, SheetFormat, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// RawTable - 原始表格
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTable {
    pub headers: Vec<HeaderCell>,     // 表头单元格（按列序）
    pub rows: Vec<DataRow>,           // 数据行（不含表头）
    pub header_row_number: usize,     // 表头在源文件中的行号（1 起）
    pub source: SourceKind,           // 来源
    pub ocr_confidence: Option<f64>,  // OCR 识别置信度（仅 OCR 来源）
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderCell {
    pub index: usize,  // 列序号（0 起）
    pub label: String, // 推断列名（空表头补为 "Column N"）
    pub raw: String,   // 原始表头文本
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRow {
    pub row_number: usize,  // 源文件行号（1 起），用于错误定位
    pub cells: Vec<String>, // 已补齐到表头宽度
}

impl RawTable {
    /// 按行列取值（越界视为空串）
    pub fn cell<'a>(&self, row: &'a DataRow, column: usize) -> &'a str {
        row.cells.get(column).map(|s| s.as_str()).unwrap_or("")
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// 取前 n 行作为样本
    pub fn sample_rows(&self, n: usize) -> &[DataRow] {
        &self.rows[..self.rows.len().min(n)]
    }

    /// 取某列的样本值（去空白，跳过空值）
    pub fn sample_column(&self, column: usize, n: usize) -> Vec<String> {
        self.sample_rows(n)
            .iter()
            .map(|r| self.cell(r, column).trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

// ==========================================
// FormatDetection - 版式识别结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDetection {
    pub format: SheetFormat,
    pub confidence: f64, // [0, 1]
    pub hints: FormatHints,
}

impl FormatDetection {
    pub fn unknown() -> Self {
        Self {
            format: SheetFormat::Unknown,
            confidence: 0.0,
            hints: FormatHints::default(),
        }
    }
}

/// 版式定位提示
///
/// matrix: 分区表头所在行、重量段所在列、分区列集合
/// list:   命中的角色族（zone/weight/price）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatHints {
    pub zone_header_row: Option<usize>,
    pub weight_column: Option<usize>,
    pub zone_columns: Vec<usize>,
    pub matched_families: Vec<String>,
}

// ==========================================
// ColumnMapping - 列映射结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub mappings: BTreeMap<ColumnRole, MappedColumn>,
    pub unmapped_columns: Vec<UnmappedColumn>,
    pub suggestions: Vec<String>,
    pub warnings: Vec<String>,
}

impl ColumnMapping {
    pub fn column(&self, role: ColumnRole) -> Option<usize> {
        self.mappings.get(&role).map(|m| m.column_index)
    }

    pub fn has(&self, role: ColumnRole) -> bool {
        self.mappings.contains_key(&role)
    }

    /// 手工指定映射（前端确认/修改映射时使用）
    pub fn assign(&mut self, role: ColumnRole, column_index: usize, header: impl Into<String>) {
        self.mappings.insert(
            role,
            MappedColumn {
                column_index,
                header: header.into(),
                confidence: 1.0,
            },
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedColumn {
    pub column_index: usize,
    pub header: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmappedColumn {
    pub column_index: usize,
    pub header: String,
    pub best_guess: Option<ColumnRole>, // 得分最高但未被采纳的角色
    pub best_score: f64,
}

/// 映射校验结果（缺必需角色为错误）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub missing_roles: Vec<String>,
}
