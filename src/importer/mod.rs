// ==========================================
// 尾程运价引擎 - 导入层
// ==========================================
// 职责: 承运商价卡文件 → 原始表格 → 重量段候选 → 校验报告 → 价卡
// 支持: CSV, Excel (.xlsx/.xlsm/.xls/.ods), PDF/图片（经 OCR 服务）
// ==========================================

// 模块声明
pub mod column_mapper;
pub mod error;
pub mod file_parser;
pub mod format_detector;
pub mod preview_cache;
pub mod rate_importer_impl;
pub mod rate_importer_trait;
pub mod rate_normalizer;
pub mod rate_validator;
pub mod value_parser;

// 重导出核心类型
pub use column_mapper::ColumnMapper as ColumnMapperImpl;
pub use error::{ImportError, ImportResult};
pub use file_parser::{
    CsvTableReader, ExcelTableReader, OcrService, OcrTable, OcrTableReader, UniversalTableReader,
};
pub use format_detector::FormatDetector as FormatDetectorImpl;
pub use preview_cache::PreviewCache;
pub use rate_importer_impl::RateImporterImpl;
pub use rate_normalizer::RateNormalizer as RateNormalizerImpl;
pub use rate_validator::RateValidator as RateValidatorImpl;

// 重导出 Trait 接口
pub use rate_importer_trait::{
    ColumnMapper, FormatDetector, RateImporter, RateNormalizer, RateValidator, TableReader,
};
