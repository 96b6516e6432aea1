// ==========================================
// 尾程运价引擎 - 价卡导入 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// 管道: 读表 → 版式识别 → 列映射(list) → 归一化 → 校验 → 确认落库
// ==========================================

use crate::domain::import::{
    FullValidation, ImportOptions, ImportPreview, NormalizeOptions, ParseResult,
    ValidationOptions,
};
use crate::domain::rate::{RateCardInfo, RateCardWriteSummary, RateTierCandidate};
use crate::domain::table::{ColumnMapping, FormatDetection, MappingValidation, RawTable};
use crate::domain::types::SheetFormat;
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// RateImporter Trait
// ==========================================
// 用途: 价卡导入主接口
// 实现者: RateImporterImpl
#[async_trait]
pub trait RateImporter: Send + Sync {
    /// 解析上传文件
    ///
    /// # 参数
    /// - bytes: 文件内容
    /// - file_name: 原始文件名（按扩展名选择读取器）
    ///
    /// # 返回
    /// - Ok(ParseResult): 原始表格 + 版式识别 + 自动列映射，已写入预览缓存
    /// - Err: 文件不可读、OCR 不可用、超时
    async fn parse_file(&self, bytes: Vec<u8>, file_name: &str) -> ImportResult<ParseResult>;

    /// 按解析结果生成导入预览
    ///
    /// # 参数
    /// - parsed: parse_file 的结果
    /// - mapping: 调用方确认后的列映射（None = 使用自动映射）
    /// - options: 版式覆盖、归一化与校验选项
    async fn preview_import(
        &self,
        parsed: &ParseResult,
        mapping: Option<ColumnMapping>,
        options: &ImportOptions,
    ) -> ImportResult<ImportPreview>;

    /// 按缓存的 parse_id 生成导入预览
    async fn preview_by_parse_id(
        &self,
        parse_id: &str,
        mapping: Option<ColumnMapping>,
        options: &ImportOptions,
    ) -> ImportResult<ImportPreview>;

    /// 确认导入（价卡头 + 重量段 + 附加费，单事务）
    ///
    /// # 返回
    /// - Ok(RateCardWriteSummary): rate_card_id + 成功/失败行数
    /// - Err: 无有效记录、重复段阻断、价卡头写入失败
    async fn confirm_import(
        &self,
        rates: Vec<RateTierCandidate>,
        info: RateCardInfo,
        options: &ImportOptions,
    ) -> ImportResult<RateCardWriteSummary>;

    /// 按缓存的 preview_id 确认导入（仅写入校验通过的记录）
    async fn confirm_preview(
        &self,
        preview_id: &str,
        info: RateCardInfo,
        options: &ImportOptions,
    ) -> ImportResult<RateCardWriteSummary>;
}

// ==========================================
// TableReader Trait
// ==========================================
// 用途: 文件 → RawTable
// 实现者: CsvTableReader, ExcelTableReader, OcrTableReader, UniversalTableReader
#[async_trait]
pub trait TableReader: Send + Sync {
    async fn read_table(&self, bytes: &[u8], file_name: &str) -> ImportResult<RawTable>;
}

// ==========================================
// FormatDetector Trait
// ==========================================
// 实现者: FormatDetector (format_detector.rs)
pub trait FormatDetector: Send + Sync {
    fn detect(&self, table: &RawTable) -> FormatDetection;
}

// ==========================================
// ColumnMapper Trait
// ==========================================
// 实现者: ColumnMapper (column_mapper.rs)
pub trait ColumnMapper: Send + Sync {
    /// 自动推断列角色
    fn auto_map(&self, table: &RawTable) -> ColumnMapping;

    /// 校验映射完整性（list 版式要求 zone / weight / price）
    fn validate_mapping(&self, format: SheetFormat, mapping: &ColumnMapping) -> MappingValidation;
}

// ==========================================
// RateNormalizer Trait
// ==========================================
// 实现者: RateNormalizer (rate_normalizer.rs)
pub trait RateNormalizer: Send + Sync {
    /// 按版式展开为候选重量段
    ///
    /// # 参数
    /// - format: matrix 或 list（unknown 返回错误）
    /// - detection: 版式定位提示（matrix 使用）
    /// - mapping: 列映射（list 必需）
    fn normalize(
        &self,
        table: &RawTable,
        format: SheetFormat,
        detection: &FormatDetection,
        mapping: Option<&ColumnMapping>,
        options: &NormalizeOptions,
    ) -> ImportResult<Vec<RateTierCandidate>>;
}

// ==========================================
// RateValidator Trait
// ==========================================
// 实现者: RateValidator (rate_validator.rs)
pub trait RateValidator: Send + Sync {
    fn validate(&self, records: &[RateTierCandidate], options: &ValidationOptions)
        -> FullValidation;
}
