// ==========================================
// 尾程运价引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// 约定: 缺失键使用默认值；存在但格式错误的值返回 ConfigError
// ==========================================

use crate::config::rate_config_trait::{ConfigError, ConfigResult, RateConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::import::ValidationOptions;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// 预览缓存 TTL 上限（30 天）
pub const MAX_PREVIEW_TTL_SECS: u64 = 30 * 24 * 3600;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> ConfigResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::Storage(format!("锁获取失败: {}", e)))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// global scope 全部配置快照
    pub fn get_config_snapshot(&self) -> ConfigResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }
        Ok(snapshot)
    }

    /// 读取并解析配置值，缺失时返回默认值
    fn get_parsed<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// 布尔值接受 true/false/1/0/yes/no
    fn get_bool(&self, key: &str, default: bool) -> ConfigResult<bool> {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                    message: "需要布尔值".to_string(),
                }),
            },
        }
    }

    fn require_positive(key: &str, value: f64) -> ConfigResult<f64> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                message: "必须为正数".to_string(),
            })
        }
    }
}

// ==========================================
// RateConfigReader Trait 实现
// ==========================================
#[async_trait]
impl RateConfigReader for ConfigManager {
    async fn get_volumetric_factor(&self) -> ConfigResult<f64> {
        let value = self.get_parsed(config_keys::VOLUMETRIC_FACTOR, 5000.0)?;
        Self::require_positive(config_keys::VOLUMETRIC_FACTOR, value)
    }

    async fn get_preview_ttl_secs(&self) -> ConfigResult<u64> {
        let ttl: u64 = self.get_parsed(config_keys::PREVIEW_TTL_SECS, 1800)?;
        if ttl == 0 || ttl > MAX_PREVIEW_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                key: config_keys::PREVIEW_TTL_SECS.to_string(),
                value: ttl.to_string(),
                message: format!("必须在 1..={} 秒之间", MAX_PREVIEW_TTL_SECS),
            });
        }
        Ok(ttl)
    }

    async fn get_preview_capacity(&self) -> ConfigResult<usize> {
        self.get_parsed(config_keys::PREVIEW_CAPACITY, 64)
    }

    async fn get_parse_timeout_secs(&self) -> ConfigResult<u64> {
        self.get_parsed(config_keys::PARSE_TIMEOUT_SECS, 60)
    }

    async fn get_validation_options(&self) -> ConfigResult<ValidationOptions> {
        let defaults = ValidationOptions::default();
        Ok(ValidationOptions {
            require_purchase_price: self
                .get_bool(config_keys::REQUIRE_PURCHASE_PRICE, defaults.require_purchase_price)?,
            require_sales_price: self
                .get_bool(config_keys::REQUIRE_SALES_PRICE, defaults.require_sales_price)?,
            allow_negative_price: self
                .get_bool(config_keys::ALLOW_NEGATIVE_PRICE, defaults.allow_negative_price)?,
            max_price: self.get_parsed::<Decimal>(config_keys::MAX_PRICE, defaults.max_price)?,
            min_weight: self.get_parsed(config_keys::MIN_WEIGHT, defaults.min_weight)?,
            max_weight: self.get_parsed(config_keys::MAX_WEIGHT, defaults.max_weight)?,
        })
    }

    async fn get_default_currency(&self) -> ConfigResult<String> {
        let value = self
            .get_config_value(config_keys::DEFAULT_CURRENCY)?
            .map(|v| v.trim().to_uppercase())
            .filter(|v| !v.is_empty());
        Ok(value.unwrap_or_else(|| "EUR".to_string()))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 计价
    pub const VOLUMETRIC_FACTOR: &str = "pricing/volumetric_factor";

    // 预览缓存与解析
    pub const PREVIEW_TTL_SECS: &str = "import/preview_ttl_secs";
    pub const PREVIEW_CAPACITY: &str = "import/preview_capacity";
    pub const PARSE_TIMEOUT_SECS: &str = "import/parse_timeout_secs";

    // 校验
    pub const REQUIRE_PURCHASE_PRICE: &str = "import/require_purchase_price";
    pub const REQUIRE_SALES_PRICE: &str = "import/require_sales_price";
    pub const ALLOW_NEGATIVE_PRICE: &str = "import/allow_negative_price";
    pub const MAX_PRICE: &str = "import/max_price";
    pub const MIN_WEIGHT: &str = "import/min_weight";
    pub const MAX_WEIGHT: &str = "import/max_weight";

    pub const DEFAULT_CURRENCY: &str = "import/default_currency";
}
