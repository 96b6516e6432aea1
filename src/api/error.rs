// ==========================================
// 尾程运价引擎 - API层错误类型
// ==========================================
// 职责: 将导入/计价/仓储/配置错误转换为面向调用方的错误类别
// 约定: 所有错误信息包含显式原因
// ==========================================

use crate::config::ConfigError;
use crate::engine::PricingError;
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 业务错误
    // ==========================================
    #[error("价卡导入失败: {0}")]
    ImportError(String),

    #[error("计价失败: {0}")]
    PricingError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::ValidationError(format!("存储字段{}无法解析: {}", field, message))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ValidationError(format!("唯一约束违反: {}", msg))
            }
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Storage(msg) => ApiError::DatabaseError(msg),
            invalid @ ConfigError::InvalidValue { .. } => {
                ApiError::ValidationError(invalid.to_string())
            }
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::UnsupportedFormat(_) | ImportError::UnknownFormat => {
                ApiError::InvalidInput(err.to_string())
            }
            ImportError::PreviewExpired(id) => {
                ApiError::NotFound(format!("预览不存在或已过期: {}", id))
            }
            ImportError::MappingIncomplete { .. }
            | ImportError::DuplicatesBlocking(_)
            | ImportError::NoValidRecords => ApiError::ValidationError(err.to_string()),
            ImportError::Repository(e) => ApiError::from(e),
            ImportError::Config(e) => ApiError::from(e),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

// ==========================================
// 从 PricingError 转换
// ==========================================
impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::InvalidRequest(msg) => ApiError::InvalidInput(msg),
            PricingError::Repository(e) => ApiError::from(e),
            PricingError::Config(e) => ApiError::from(e),
            other => ApiError::PricingError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
