// ==========================================
// 尾程运价引擎 - 配置层
// ==========================================
// 职责: 导入与计价参数管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod rate_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use rate_config_trait::{ConfigError, ConfigResult, RateConfigReader};
