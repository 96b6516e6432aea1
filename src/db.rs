// ==========================================
// 尾程运价引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供建库脚本，测试与 CLI 共用同一份表结构
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 开启 WAL 日志模式（持久化于数据库文件）
///
/// WAL 下读连接看到最近一次提交的快照，不等待其他连接上未提交的写事务。
/// 内存库返回 "memory"，此时该设置无效
pub fn enable_wal(conn: &Connection) -> rusqlite::Result<String> {
    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS carrier_zone (
    zone_id INTEGER PRIMARY KEY AUTOINCREMENT,
    carrier_id INTEGER NOT NULL,
    zone_code TEXT NOT NULL,
    zone_name TEXT NOT NULL DEFAULT '',
    postal_prefixes TEXT NOT NULL DEFAULT '[]',
    country_codes TEXT NOT NULL DEFAULT '[]',
    priority INTEGER NOT NULL DEFAULT 0,
    UNIQUE(carrier_id, zone_code)
);

CREATE TABLE IF NOT EXISTS rate_card (
    rate_card_id INTEGER PRIMARY KEY AUTOINCREMENT,
    carrier_id INTEGER NOT NULL,
    card_code TEXT NOT NULL,
    card_name TEXT NOT NULL,
    card_type TEXT NOT NULL DEFAULT 'last_mile',
    service_type TEXT,
    valid_from TEXT NOT NULL,
    valid_to TEXT,
    currency TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
    is_default INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rate_card_carrier ON rate_card(carrier_id, status);

CREATE TABLE IF NOT EXISTS rate_tier (
    tier_id INTEGER PRIMARY KEY AUTOINCREMENT,
    rate_card_id INTEGER NOT NULL REFERENCES rate_card(rate_card_id) ON DELETE CASCADE,
    zone_code TEXT NOT NULL,
    weight_from REAL NOT NULL,
    weight_to REAL NOT NULL,
    purchase_price TEXT,
    sales_price TEXT,
    price_unit TEXT NOT NULL DEFAULT 'per_shipment',
    min_purchase_charge TEXT,
    min_sales_charge TEXT,
    CHECK (weight_to >= weight_from),
    UNIQUE(rate_card_id, zone_code, weight_from, weight_to)
);

CREATE INDEX IF NOT EXISTS idx_rate_tier_card_zone ON rate_tier(rate_card_id, zone_code);

CREATE TABLE IF NOT EXISTS rate_surcharge (
    surcharge_id INTEGER PRIMARY KEY AUTOINCREMENT,
    rate_card_id INTEGER NOT NULL REFERENCES rate_card(rate_card_id) ON DELETE CASCADE,
    code TEXT NOT NULL,
    name TEXT NOT NULL,
    charge_type TEXT NOT NULL CHECK (charge_type IN ('fixed', 'percentage')),
    purchase_amount TEXT,
    sales_amount TEXT,
    percentage TEXT,
    is_mandatory INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS shipment_cost (
    shipment_id TEXT PRIMARY KEY,
    carrier_id INTEGER NOT NULL,
    zone_code TEXT NOT NULL,
    shipped_on TEXT NOT NULL,
    chargeable_weight REAL NOT NULL,
    purchase_amount TEXT NOT NULL,
    sales_amount TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shipment_cost_carrier_date ON shipment_cost(carrier_id, shipped_on);
"#;

/// 建库（幂等）并写入当前 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));

        assert_eq!(enable_wal(&conn).unwrap(), "memory");

        let scopes: i64 = conn
            .query_row("SELECT COUNT(*) FROM config_scope", [], |r| r.get(0))
            .unwrap();
        assert_eq!(scopes, 1);
    }

    #[test]
    fn test_enable_wal_on_file_database() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let conn = open_sqlite_connection(file.path().to_str().unwrap()).unwrap();
        assert_eq!(enable_wal(&conn).unwrap().to_lowercase(), "wal");
    }
}
