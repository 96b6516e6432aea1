// ==========================================
// 尾程运价引擎 - 利润分析报表
// ==========================================
// 职责: 重量段毛利报表、运单利润汇总（按分区 / 按月）
// 约定: 数据不足时报表标记 insufficient，不作为错误返回
// ==========================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 单个分区的重量段毛利
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneTierMargin {
    pub zone_code: String,
    pub tier_count: usize,
    pub priced_tier_count: usize, // 采购价与销售价都有的重量段
    pub avg_purchase: Decimal,
    pub avg_sales: Decimal,
    pub avg_profit: Decimal,
    pub avg_margin_rate: Option<Decimal>,
    pub min_margin_rate: Option<Decimal>,
    pub max_margin_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierMarginReport {
    pub rate_card_id: i64,
    pub zones: Vec<ZoneTierMargin>,
    pub priced_tier_count: usize,
    pub insufficient: bool,
    pub message: Option<String>,
}

/// 汇总桶（key 为分区代码或 YYYY-MM）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitBucket {
    pub key: String,
    pub shipment_count: usize,
    pub total_weight: f64,
    pub total_purchase: Decimal,
    pub total_sales: Decimal,
    pub total_profit: Decimal,
    pub avg_purchase: Decimal,
    pub avg_sales: Decimal,
    pub avg_profit: Decimal,
    pub margin_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentProfitReport {
    pub carrier_id: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub by_zone: Vec<ProfitBucket>,
    pub by_month: Vec<ProfitBucket>,
    pub total: ProfitBucket,
    pub insufficient: bool,
    pub message: Option<String>,
}
