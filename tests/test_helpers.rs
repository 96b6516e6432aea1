// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、组件装配、分区/价卡/运单种子数据
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use freight_rate_engine::config::ConfigManager;
use freight_rate_engine::db::{enable_wal, init_schema, open_sqlite_connection};
use freight_rate_engine::domain::rate::{NewRateTier, NewSurcharge, RateCardInfo};
use freight_rate_engine::domain::shipment::ShipmentCostRecord;
use freight_rate_engine::domain::types::{ChargeType, PriceUnit};
use freight_rate_engine::domain::zone::Zone;
use freight_rate_engine::engine::{PricingEngine, ProfitAnalyzer};
use freight_rate_engine::importer::RateImporterImpl;
use freight_rate_engine::repository::{
    RateCardRepository, RateCardRepositoryImpl, ShipmentCostRepository,
    ShipmentCostRepositoryImpl, ZoneRepository, ZoneRepositoryImpl,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    enable_wal(&conn)?;

    Ok((temp_file, db_path))
}

/// 测试环境：与 AppState 相同的读写连接划分
///
/// 仓储字段均在写连接 `conn` 上；计价引擎与利润分析器走 `read_conn`
pub struct TestEnv {
    pub _db_file: NamedTempFile,
    pub conn: Arc<Mutex<Connection>>,
    pub read_conn: Arc<Mutex<Connection>>,
    pub config: Arc<ConfigManager>,
    pub zone_repo: Arc<ZoneRepositoryImpl>,
    pub rate_card_repo: Arc<RateCardRepositoryImpl>,
    pub shipment_repo: Arc<ShipmentCostRepositoryImpl>,
}

impl TestEnv {
    pub fn new() -> Self {
        let (db_file, db_path) = create_test_db().unwrap();
        let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path).unwrap()));
        let read_conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path).unwrap()));
        Self {
            _db_file: db_file,
            config: Arc::new(ConfigManager::from_connection(conn.clone())),
            zone_repo: Arc::new(ZoneRepositoryImpl::from_connection(conn.clone())),
            rate_card_repo: Arc::new(RateCardRepositoryImpl::from_connection(conn.clone())),
            shipment_repo: Arc::new(ShipmentCostRepositoryImpl::from_connection(conn.clone())),
            conn,
            read_conn,
        }
    }

    pub fn pricing_engine(&self) -> PricingEngine {
        PricingEngine::new(
            Arc::new(RateCardRepositoryImpl::from_connection(self.read_conn.clone())),
            Arc::new(ZoneRepositoryImpl::from_connection(self.read_conn.clone())),
            Arc::new(ConfigManager::from_connection(self.read_conn.clone())),
        )
    }

    pub fn profit_analyzer(&self) -> ProfitAnalyzer {
        ProfitAnalyzer::new(
            Arc::new(RateCardRepositoryImpl::from_connection(self.read_conn.clone())),
            Arc::new(ShipmentCostRepositoryImpl::from_connection(self.read_conn.clone())),
        )
    }

    pub async fn importer(&self) -> RateImporterImpl {
        RateImporterImpl::from_config(self.rate_card_repo.clone(), self.config.clone(), None)
            .await
            .unwrap()
    }

    pub fn tier_count(&self) -> i64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM rate_tier", [], |row| row.get(0))
            .unwrap()
    }
}

// ==========================================
// 种子数据
// ==========================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn card_info(carrier_id: i64, code: &str, is_default: bool) -> RateCardInfo {
    RateCardInfo {
        carrier_id,
        card_code: code.to_string(),
        card_name: format!("{} 价卡", code),
        card_type: "last_mile".to_string(),
        service_type: None,
        valid_from: date(2026, 1, 1),
        valid_to: None,
        currency: "EUR".to_string(),
        is_default,
        surcharges: vec![],
    }
}

pub fn tier(zone: &str, from: f64, to: f64, purchase: Decimal, sales: Option<Decimal>) -> NewRateTier {
    NewRateTier {
        zone_code: zone.to_string(),
        weight_from: from,
        weight_to: to,
        purchase_price: Some(purchase),
        sales_price: sales,
        price_unit: PriceUnit::PerShipment,
        min_purchase_charge: None,
        min_sales_charge: None,
        row_number: 0,
    }
}

/// 按公斤计价的重量段，可带最低收费
pub fn per_kg_tier(
    zone: &str,
    from: f64,
    to: f64,
    purchase: Decimal,
    sales: Decimal,
    min_purchase: Option<Decimal>,
    min_sales: Option<Decimal>,
) -> NewRateTier {
    NewRateTier {
        price_unit: PriceUnit::PerKg,
        min_purchase_charge: min_purchase,
        min_sales_charge: min_sales,
        ..tier(zone, from, to, purchase, Some(sales))
    }
}

pub fn percentage_surcharge(code: &str, percentage: Decimal) -> NewSurcharge {
    NewSurcharge {
        code: code.to_string(),
        name: code.to_string(),
        charge_type: ChargeType::Percentage,
        purchase_amount: None,
        sales_amount: None,
        percentage: Some(percentage),
        is_mandatory: true,
    }
}

pub fn fixed_surcharge(code: &str, purchase: Decimal, sales: Decimal, mandatory: bool) -> NewSurcharge {
    NewSurcharge {
        code: code.to_string(),
        name: code.to_string(),
        charge_type: ChargeType::Fixed,
        purchase_amount: Some(purchase),
        sales_amount: Some(sales),
        percentage: None,
        is_mandatory: mandatory,
    }
}

pub fn zone(carrier_id: i64, code: &str, priority: i32, prefixes: &[&str], countries: &[&str]) -> Zone {
    Zone {
        zone_id: 0,
        carrier_id,
        zone_code: code.to_string(),
        zone_name: code.to_string(),
        postal_prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
        country_codes: countries
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>(),
        priority,
    }
}

/// 写入一张价卡，返回 rate_card_id
pub async fn seed_card(
    env: &TestEnv,
    info: RateCardInfo,
    tiers: Vec<NewRateTier>,
) -> i64 {
    env.rate_card_repo
        .create_rate_card_with_tiers(&info, tiers)
        .await
        .unwrap()
        .rate_card_id
}

pub async fn seed_zone(env: &TestEnv, zone: Zone) -> i64 {
    env.zone_repo.save_zone(&zone).await.unwrap()
}

pub async fn seed_shipments(env: &TestEnv, records: Vec<ShipmentCostRecord>) -> usize {
    env.shipment_repo.batch_insert(records).await.unwrap()
}

pub fn shipment(
    id: &str,
    carrier_id: i64,
    zone: &str,
    shipped_on: NaiveDate,
    purchase: Decimal,
    sales: Decimal,
) -> ShipmentCostRecord {
    ShipmentCostRecord {
        shipment_id: id.to_string(),
        carrier_id,
        zone_code: zone.to_string(),
        shipped_on,
        chargeable_weight: 1.0,
        purchase_amount: purchase,
        sales_amount: sales,
    }
}
