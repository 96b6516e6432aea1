// ==========================================
// 尾程运价引擎 - 价卡 Repository 实现
// ==========================================
// 职责: 实现价卡/重量段/附加费数据访问（使用 rusqlite）
// 红线: Repository 不含计价规则，只做数据读写
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::rate::{
    NewRateTier, NewSurcharge, RateCard, RateCardInfo, RateCardWriteSummary, RateTier,
    Surcharge, TierWriteFailure,
};
use crate::domain::types::{ChargeType, PriceUnit, RateCardStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::rate_card_repo::RateCardRepository;
use crate::repository::sql_values::{
    date_column, date_to_text, datetime_column, decimal_column, decimal_to_text, enum_column,
    optional_date_column,
};
use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const RATE_CARD_COLUMNS: &str = r#"
    rate_card_id, carrier_id, card_code, card_name, card_type, service_type,
    valid_from, valid_to, currency, status, is_default, created_at
"#;

const RATE_TIER_COLUMNS: &str = r#"
    tier_id, rate_card_id, zone_code, weight_from, weight_to, purchase_price,
    sales_price, price_unit, min_purchase_charge, min_sales_charge
"#;

fn map_rate_card(row: &Row<'_>) -> rusqlite::Result<RateCard> {
    Ok(RateCard {
        rate_card_id: row.get(0)?,
        carrier_id: row.get(1)?,
        card_code: row.get(2)?,
        card_name: row.get(3)?,
        card_type: row.get(4)?,
        service_type: row.get(5)?,
        valid_from: date_column(row, 6)?,
        valid_to: optional_date_column(row, 7)?,
        currency: row.get(8)?,
        status: enum_column(row, 9, RateCardStatus::parse)?,
        is_default: row.get::<_, i64>(10)? != 0,
        created_at: datetime_column(row, 11)?,
    })
}

fn map_rate_tier(row: &Row<'_>) -> rusqlite::Result<RateTier> {
    Ok(RateTier {
        tier_id: row.get(0)?,
        rate_card_id: row.get(1)?,
        zone_code: row.get(2)?,
        weight_from: row.get(3)?,
        weight_to: row.get(4)?,
        purchase_price: decimal_column(row, 5)?,
        sales_price: decimal_column(row, 6)?,
        price_unit: enum_column(row, 7, PriceUnit::parse)?,
        min_purchase_charge: decimal_column(row, 8)?,
        min_sales_charge: decimal_column(row, 9)?,
    })
}

fn map_surcharge(row: &Row<'_>) -> rusqlite::Result<Surcharge> {
    Ok(Surcharge {
        surcharge_id: row.get(0)?,
        rate_card_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        charge_type: enum_column(row, 4, ChargeType::parse)?,
        purchase_amount: decimal_column(row, 5)?,
        sales_amount: decimal_column(row, 6)?,
        percentage: decimal_column(row, 7)?,
        is_mandatory: row.get::<_, i64>(8)? != 0,
    })
}

// ==========================================
// RateCardRepositoryImpl
// ==========================================
pub struct RateCardRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl RateCardRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在事务中写入价卡头，返回新 ID
    fn insert_header_tx(tx: &Transaction, info: &RateCardInfo) -> RepositoryResult<i64> {
        if info.is_default {
            let cleared = tx.execute(
                "UPDATE rate_card SET is_default = 0 WHERE carrier_id = ?1 AND is_default = 1",
                params![info.carrier_id],
            )?;
            if cleared > 0 {
                debug!(carrier_id = info.carrier_id, cleared, "清除原默认价卡标记");
            }
        }

        tx.execute(
            r#"
            INSERT INTO rate_card (
                carrier_id, card_code, card_name, card_type, service_type,
                valid_from, valid_to, currency, status, is_default, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                info.carrier_id,
                info.card_code,
                info.card_name,
                info.card_type,
                info.service_type,
                date_to_text(info.valid_from),
                info.valid_to.map(date_to_text),
                info.currency,
                RateCardStatus::Active.as_str(),
                info.is_default as i64,
                Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// 在事务中逐行写入重量段，单行失败只计数
    fn insert_tiers_tx(
        tx: &Transaction,
        rate_card_id: i64,
        tiers: &[NewRateTier],
    ) -> RepositoryResult<(usize, Vec<TierWriteFailure>)> {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO rate_tier (
                rate_card_id, zone_code, weight_from, weight_to, purchase_price,
                sales_price, price_unit, min_purchase_charge, min_sales_charge
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )?;

        let mut success = 0;
        let mut failures = Vec::new();
        for tier in tiers {
            let result = stmt.execute(params![
                rate_card_id,
                tier.zone_code,
                tier.weight_from,
                tier.weight_to,
                decimal_to_text(tier.purchase_price),
                decimal_to_text(tier.sales_price),
                tier.price_unit.as_str(),
                decimal_to_text(tier.min_purchase_charge),
                decimal_to_text(tier.min_sales_charge),
            ]);
            match result {
                Ok(_) => success += 1,
                Err(e) => {
                    let reason = RepositoryError::from(e).to_string();
                    warn!(row = tier.row_number, zone = %tier.zone_code, reason = %reason, "重量段写入失败");
                    failures.push(TierWriteFailure {
                        row_number: tier.row_number,
                        zone_code: tier.zone_code.clone(),
                        reason,
                    });
                }
            }
        }
        Ok((success, failures))
    }

    fn insert_surcharges_tx(
        tx: &Transaction,
        rate_card_id: i64,
        surcharges: &[NewSurcharge],
    ) -> RepositoryResult<usize> {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO rate_surcharge (
                rate_card_id, code, name, charge_type, purchase_amount,
                sales_amount, percentage, is_mandatory
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for s in surcharges {
            stmt.execute(params![
                rate_card_id,
                s.code,
                s.name,
                s.charge_type.as_str(),
                decimal_to_text(s.purchase_amount),
                decimal_to_text(s.sales_amount),
                decimal_to_text(s.percentage),
                s.is_mandatory as i64,
            ])?;
        }
        Ok(surcharges.len())
    }
}

#[async_trait]
impl RateCardRepository for RateCardRepositoryImpl {
    async fn create_rate_card_with_tiers(
        &self,
        info: &RateCardInfo,
        tiers: Vec<NewRateTier>,
    ) -> RepositoryResult<RateCardWriteSummary> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        // 价卡头失败 → tx 随 drop 回滚
        let rate_card_id = Self::insert_header_tx(&tx, info)?;
        let (success_count, failures) = Self::insert_tiers_tx(&tx, rate_card_id, &tiers)?;
        let surcharge_count = Self::insert_surcharges_tx(&tx, rate_card_id, &info.surcharges)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            rate_card_id,
            carrier_id = info.carrier_id,
            success = success_count,
            failed = failures.len(),
            surcharges = surcharge_count,
            "价卡写入完成"
        );

        Ok(RateCardWriteSummary {
            rate_card_id,
            success_count,
            fail_count: failures.len(),
            failures,
        })
    }

    async fn deactivate_rate_card(&self, rate_card_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE rate_card SET status = ?1, is_default = 0 WHERE rate_card_id = ?2",
            params![RateCardStatus::Inactive.as_str(), rate_card_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "RateCard".to_string(),
                id: rate_card_id.to_string(),
            });
        }
        info!(rate_card_id, "价卡已停用");
        Ok(())
    }

    async fn find_rate_card(&self, rate_card_id: i64) -> RepositoryResult<Option<RateCard>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM rate_card WHERE rate_card_id = ?1", RATE_CARD_COLUMNS);
        let card = conn
            .query_row(&sql, params![rate_card_id], map_rate_card)
            .optional()?;
        Ok(card)
    }

    async fn find_active_rate_card(
        &self,
        carrier_id: i64,
        on: NaiveDate,
    ) -> RepositoryResult<Option<RateCard>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM rate_card
            WHERE carrier_id = ?1
              AND status = 'active'
              AND valid_from <= ?2
              AND (valid_to IS NULL OR valid_to >= ?2)
            ORDER BY is_default DESC, created_at DESC, rate_card_id DESC
            LIMIT 1
            "#,
            RATE_CARD_COLUMNS
        );
        let card = conn
            .query_row(&sql, params![carrier_id, date_to_text(on)], map_rate_card)
            .optional()?;
        Ok(card)
    }

    async fn list_rate_cards(&self, carrier_id: i64) -> RepositoryResult<Vec<RateCard>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM rate_card WHERE carrier_id = ?1 ORDER BY created_at DESC, rate_card_id DESC",
            RATE_CARD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let cards = stmt
            .query_map(params![carrier_id], map_rate_card)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    async fn list_active_carriers(&self, on: NaiveDate) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT carrier_id FROM rate_card
            WHERE status = 'active'
              AND valid_from <= ?1
              AND (valid_to IS NULL OR valid_to >= ?1)
            ORDER BY carrier_id
            "#,
        )?;
        let carriers = stmt
            .query_map(params![date_to_text(on)], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(carriers)
    }

    async fn find_tiers(
        &self,
        rate_card_id: i64,
        zone_code: &str,
    ) -> RepositoryResult<Vec<RateTier>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM rate_tier WHERE rate_card_id = ?1 AND zone_code = ?2 ORDER BY weight_from, weight_to",
            RATE_TIER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tiers = stmt
            .query_map(params![rate_card_id, zone_code], map_rate_tier)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tiers)
    }

    async fn find_tiers_for_weight(
        &self,
        rate_card_id: i64,
        zone_code: &str,
        weight: f64,
    ) -> RepositoryResult<Vec<RateTier>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM rate_tier
            WHERE rate_card_id = ?1 AND zone_code = ?2
              AND weight_from <= ?3 AND weight_to >= ?3
            ORDER BY weight_from, weight_to
            "#,
            RATE_TIER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tiers = stmt
            .query_map(params![rate_card_id, zone_code, weight], map_rate_tier)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tiers)
    }

    async fn find_tiers_by_card(&self, rate_card_id: i64) -> RepositoryResult<Vec<RateTier>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM rate_tier WHERE rate_card_id = ?1 ORDER BY zone_code, weight_from, weight_to",
            RATE_TIER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let tiers = stmt
            .query_map(params![rate_card_id], map_rate_tier)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tiers)
    }

    async fn find_surcharges(&self, rate_card_id: i64) -> RepositoryResult<Vec<Surcharge>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT surcharge_id, rate_card_id, code, name, charge_type,
                   purchase_amount, sales_amount, percentage, is_mandatory
            FROM rate_surcharge
            WHERE rate_card_id = ?1
            ORDER BY surcharge_id
            "#,
        )?;
        let surcharges = stmt
            .query_map(params![rate_card_id], map_surcharge)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(surcharges)
    }
}
