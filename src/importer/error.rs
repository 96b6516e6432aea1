// ==========================================
// 尾程运价引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 行级数据问题不走错误通道（进入校验报告），此处只有阻断性错误
// ==========================================

use crate::config::ConfigError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件格式不支持: {0}（支持 .csv/.xlsx/.xlsm/.xls/.ods/.pdf/.png/.jpg/.tif）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("文件中没有可识别的表格数据: {0}")]
    EmptyTable(String),

    // ===== OCR 相关错误 =====
    #[error("OCR 服务未配置，无法解析 {0}")]
    OcrUnavailable(String),

    #[error("OCR 识别失败: {0}")]
    OcrFailed(String),

    #[error("文件解析超时（{timeout_secs} 秒）: {file_name}")]
    ParseTimeout { file_name: String, timeout_secs: u64 },

    // ===== 版式与映射错误 =====
    #[error("无法识别价卡版式（matrix/list），请手工指定")]
    UnknownFormat,

    #[error("列映射不完整，缺少必需角色: {}", missing.join(", "))]
    MappingIncomplete { missing: Vec<String> },

    // ===== 预览与确认错误 =====
    #[error("预览不存在或已过期: {0}")]
    PreviewExpired(String),

    #[error("存在 {0} 组重复重量段，需先处理后再确认导入")]
    DuplicatesBlocking(usize),

    #[error("没有通过校验的记录可导入")]
    NoValidRecords,

    // ===== 下游错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
