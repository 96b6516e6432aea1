// ==========================================
// 尾程运价引擎 - 运单成本记录
// ==========================================
// 用途: 利润分析的只读输入（由外部运单模块写入 shipment_cost 表）
// ==========================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentCostRecord {
    pub shipment_id: String,
    pub carrier_id: i64,
    pub zone_code: String,
    pub shipped_on: NaiveDate,
    pub chargeable_weight: f64,
    pub purchase_amount: Decimal,
    pub sales_amount: Decimal,
}
