// ==========================================
// 尾程运价引擎 - 运单成本数据仓储
// ==========================================
// 职责: shipment_cost 表读写（利润分析的数据来源）
// 说明: 运单级计价结果由外部模块写入，本模块只提供存取接口
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::shipment::ShipmentCostRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_values::{date_column, date_to_text, decimal_to_text, required_decimal_column};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait ShipmentCostRepository: Send + Sync {
    /// 批量写入（INSERT OR REPLACE，单事务）
    async fn batch_insert(&self, records: Vec<ShipmentCostRecord>) -> RepositoryResult<usize>;

    /// 按承运商 + 发运日期区间（含两端）查询
    async fn find_by_carrier(
        &self,
        carrier_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<ShipmentCostRecord>>;
}

pub struct ShipmentCostRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ShipmentCostRepositoryImpl {
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
impl ShipmentCostRepository for ShipmentCostRepositoryImpl {
    async fn batch_insert(&self, records: Vec<ShipmentCostRecord>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO shipment_cost (
                    shipment_id, carrier_id, zone_code, shipped_on,
                    chargeable_weight, purchase_amount, sales_amount
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for r in &records {
                stmt.execute(params![
                    r.shipment_id,
                    r.carrier_id,
                    r.zone_code,
                    date_to_text(r.shipped_on),
                    r.chargeable_weight,
                    decimal_to_text(Some(r.purchase_amount)),
                    decimal_to_text(Some(r.sales_amount)),
                ])?;
            }
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(records.len())
    }

    async fn find_by_carrier(
        &self,
        carrier_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<Vec<ShipmentCostRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT shipment_id, carrier_id, zone_code, shipped_on,
                   chargeable_weight, purchase_amount, sales_amount
            FROM shipment_cost
            WHERE carrier_id = ?1 AND shipped_on >= ?2 AND shipped_on <= ?3
            ORDER BY shipped_on, shipment_id
            "#,
        )?;
        let records = stmt
            .query_map(
                params![carrier_id, date_to_text(from), date_to_text(to)],
                |row| {
                    Ok(ShipmentCostRecord {
                        shipment_id: row.get(0)?,
                        carrier_id: row.get(1)?,
                        zone_code: row.get(2)?,
                        shipped_on: date_column(row, 3)?,
                        chargeable_weight: row.get(4)?,
                        purchase_amount: required_decimal_column(row, 5)?,
                        sales_amount: required_decimal_column(row, 6)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
