// ==========================================
// 尾程运价引擎 - 配置读取 Trait
// ==========================================
// 职责: 定义导入与计价所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::import::ValidationOptions;
use async_trait::async_trait;
use thiserror::Error;

/// 配置读取错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置存储访问失败: {0}")]
    Storage(String),

    #[error("配置值非法 (key={key}, value={value}): {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

impl From<rusqlite::Error> for ConfigError {
    fn from(err: rusqlite::Error) -> Self {
        ConfigError::Storage(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// RateConfigReader Trait
// ==========================================
// 用途: 导入/计价模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait RateConfigReader: Send + Sync {
    // ===== 计价配置 =====

    /// 体积重系数（cm³/kg）
    ///
    /// # 默认值
    /// - 5000（1 m³ ≈ 200 kg）
    async fn get_volumetric_factor(&self) -> ConfigResult<f64>;

    // ===== 导入配置 =====

    /// 预览缓存有效期（秒）
    ///
    /// # 默认值
    /// - 1800
    async fn get_preview_ttl_secs(&self) -> ConfigResult<u64>;

    /// 预览缓存容量
    ///
    /// # 默认值
    /// - 64
    async fn get_preview_capacity(&self) -> ConfigResult<usize>;

    /// 文件解析超时（秒）
    ///
    /// # 默认值
    /// - 60
    async fn get_parse_timeout_secs(&self) -> ConfigResult<u64>;

    /// 校验选项（import/require_* / allow_negative_price / max_price / min_weight / max_weight）
    async fn get_validation_options(&self) -> ConfigResult<ValidationOptions>;

    /// 默认币种
    ///
    /// # 默认值
    /// - EUR
    async fn get_default_currency(&self) -> ConfigResult<String>;
}
