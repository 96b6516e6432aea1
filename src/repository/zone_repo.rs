// ==========================================
// 尾程运价引擎 - 分区数据仓储
// ==========================================
// 职责: carrier_zone 表读写
// 约定: 邮编前缀/国家列表以 JSON 文本存储，只在本层解码为类型化集合
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::zone::{normalize_country_code, normalize_postal_code, Zone};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_values::json_list_column;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ZoneRepository Trait
// ==========================================
#[async_trait]
pub trait ZoneRepository: Send + Sync {
    /// 承运商全部分区（按 priority, zone_code 升序 = 匹配顺序）
    async fn list_zones(&self, carrier_id: i64) -> RepositoryResult<Vec<Zone>>;

    async fn find_zone(&self, carrier_id: i64, zone_code: &str) -> RepositoryResult<Option<Zone>>;

    /// 新增或按 (carrier_id, zone_code) 覆盖，返回 zone_id
    async fn save_zone(&self, zone: &Zone) -> RepositoryResult<i64>;
}

fn map_zone(row: &Row<'_>) -> rusqlite::Result<Zone> {
    let prefixes = json_list_column(row, 4)?;
    let countries = json_list_column(row, 5)?;
    Ok(Zone {
        zone_id: row.get(0)?,
        carrier_id: row.get(1)?,
        zone_code: row.get(2)?,
        zone_name: row.get(3)?,
        postal_prefixes: prefixes
            .iter()
            .map(|p| normalize_postal_code(p))
            .filter(|p| !p.is_empty())
            .collect(),
        country_codes: countries
            .iter()
            .map(|c| normalize_country_code(c))
            .filter(|c| !c.is_empty())
            .collect(),
        priority: row.get(6)?,
    })
}

const ZONE_COLUMNS: &str =
    "zone_id, carrier_id, zone_code, zone_name, postal_prefixes, country_codes, priority";

// ==========================================
// ZoneRepositoryImpl
// ==========================================
pub struct ZoneRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ZoneRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl ZoneRepository for ZoneRepositoryImpl {
    async fn list_zones(&self, carrier_id: i64) -> RepositoryResult<Vec<Zone>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM carrier_zone WHERE carrier_id = ?1 ORDER BY priority, zone_code",
            ZONE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let zones = stmt
            .query_map(params![carrier_id], map_zone)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(zones)
    }

    async fn find_zone(&self, carrier_id: i64, zone_code: &str) -> RepositoryResult<Option<Zone>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM carrier_zone WHERE carrier_id = ?1 AND zone_code = ?2",
            ZONE_COLUMNS
        );
        let zone = conn
            .query_row(&sql, params![carrier_id, zone_code], map_zone)
            .optional()?;
        Ok(zone)
    }

    async fn save_zone(&self, zone: &Zone) -> RepositoryResult<i64> {
        let prefixes = serde_json::to_string(&zone.postal_prefixes)?;
        let countries = serde_json::to_string(&zone.country_codes)?;

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO carrier_zone (
                carrier_id, zone_code, zone_name, postal_prefixes, country_codes, priority
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(carrier_id, zone_code) DO UPDATE SET
                zone_name = excluded.zone_name,
                postal_prefixes = excluded.postal_prefixes,
                country_codes = excluded.country_codes,
                priority = excluded.priority
            "#,
            params![
                zone.carrier_id,
                zone.zone_code,
                zone.zone_name,
                prefixes,
                countries,
                zone.priority
            ],
        )?;
        let zone_id = conn.query_row(
            "SELECT zone_id FROM carrier_zone WHERE carrier_id = ?1 AND zone_code = ?2",
            params![zone.carrier_id, zone.zone_code],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(zone_id)
    }
}
