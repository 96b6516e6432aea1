// ==========================================
// 尾程运价引擎 - 导入流程数据模型
// ==========================================
// 职责: 解析结果、预览结果、导入选项、校验报告
// ==========================================

use crate::domain::rate::RateTierCandidate;
use crate::domain::table::{ColumnMapping, FormatDetection, MappingValidation, RawTable};
use crate::domain::types::{IssueLevel, PriceUnit, SheetFormat, ValidationStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// ParseResult - 文件解析结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub parse_id: String, // 预览缓存键
    pub file_name: String,
    pub raw_table: RawTable,
    pub format_detection: FormatDetection,
    pub auto_mapping: Option<ColumnMapping>, // matrix 版式不需要列映射
}

// ==========================================
// 导入选项
// ==========================================

/// 归一化选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeOptions {
    pub price_unit: PriceUnit,            // 未标注 /kg 时的默认计价单位
    pub data_start_row: Option<usize>,    // 源文件行号，早于该行的数据行忽略
    pub default_currency: Option<String>, // 行上无币种时填充
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            price_unit: PriceUnit::PerShipment,
            data_start_row: None,
            default_currency: None,
        }
    }
}

/// 校验选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOptions {
    pub require_purchase_price: bool,
    pub require_sales_price: bool,
    pub allow_negative_price: bool,
    pub max_price: Decimal,
    pub min_weight: f64,
    pub max_weight: f64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            require_purchase_price: true,
            require_sales_price: false,
            allow_negative_price: false,
            max_price: Decimal::from(100_000),
            min_weight: 0.0,
            max_weight: 1000.0,
        }
    }
}

/// 预览/确认选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    pub format_override: Option<SheetFormat>, // 调用方手工指定版式
    pub normalize: NormalizeOptions,
    pub validation: Option<ValidationOptions>, // None = 使用配置
    pub block_on_duplicates: bool,             // 重复重量段是否阻断确认
}

// ==========================================
// 校验报告
// ==========================================

/// 行级问题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIssue {
    pub row_number: usize,
    pub field: String,
    pub level: IssueLevel,
    pub message: String,
}

/// 字段/范围校验结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordValidation {
    pub valid: Vec<RateTierCandidate>,
    pub invalid: Vec<RateTierCandidate>,
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
}

/// 重复重量段（同一 zone + 起止重量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateTier {
    pub zone_code: String,
    pub weight_from: f64,
    pub weight_to: f64,
    pub row_numbers: Vec<usize>, // 升序
}

/// 重量段断档/重叠
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandIssue {
    pub zone_code: String,
    pub from: f64, // 断档/重叠区间起点
    pub to: f64,   // 断档/重叠区间终点
    pub row_numbers: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuityReport {
    pub gaps: Vec<BandIssue>,
    pub overlaps: Vec<BandIssue>,
}

impl ContinuityReport {
    pub fn is_continuous(&self) -> bool {
        self.gaps.is_empty() && self.overlaps.is_empty()
    }
}

/// 完整校验结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullValidation {
    pub can_proceed: bool,
    pub status: ValidationStatus,
    pub records: RecordValidation,
    pub duplicates: Vec<DuplicateTier>,
    pub continuity: ContinuityReport,
}

// ==========================================
// ImportPreview - 导入预览
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub preview_id: String,
    pub parse_id: Option<String>,
    pub format: SheetFormat,
    pub mapping: Option<ColumnMapping>,
    pub mapping_validation: Option<MappingValidation>,
    pub rates: Vec<RateTierCandidate>,
    pub validation: FullValidation,
    pub summary: ImportSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total_rows: usize,        // 原始数据行数
    pub candidate_count: usize,   // 归一化产出的候选数
    pub valid_count: usize,
    pub invalid_count: usize,
    pub zone_count: usize,        // 有效记录涉及的分区数
    pub duplicate_count: usize,
    pub gap_count: usize,
    pub overlap_count: usize,
    pub warning_count: usize,
    pub elapsed_ms: u64,
}
