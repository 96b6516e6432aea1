// ==========================================
// 尾程运价引擎 - 报价请求与计价结果
// ==========================================
// 职责: 计价引擎的输入/输出结构
// 生命周期: 计价结果不由本核心持久化
// ==========================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 包裹尺寸（厘米）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub length_cm: f64,
    pub width_cm: f64,
    pub height_cm: f64,
}

impl Dimensions {
    pub fn volume_cm3(&self) -> f64 {
        self.length_cm * self.width_cm * self.height_cm
    }
}

// ==========================================
// QuoteRequest - 报价请求
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub carrier_id: i64,
    pub rate_card_id: Option<i64>, // 显式指定价卡时跳过默认价卡解析
    pub zone_code: Option<String>, // 显式指定分区时跳过分区解析
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub weight_kg: f64,
    pub dimensions: Option<Dimensions>,
    pub service_type: Option<String>,
    pub pricing_date: Option<NaiveDate>, // None = 当天
}

/// 多承运商报价请求（carrier_ids 为空表示全部有生效价卡的承运商）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiQuoteRequest {
    pub carrier_ids: Vec<i64>,
    pub zone_code: Option<String>,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub weight_kg: f64,
    pub dimensions: Option<Dimensions>,
    pub pricing_date: Option<NaiveDate>,
}

impl MultiQuoteRequest {
    pub fn for_carrier(&self, carrier_id: i64) -> QuoteRequest {
        QuoteRequest {
            carrier_id,
            rate_card_id: None,
            zone_code: self.zone_code.clone(),
            postal_code: self.postal_code.clone(),
            country_code: self.country_code.clone(),
            weight_kg: self.weight_kg,
            dimensions: self.dimensions,
            service_type: None,
            pricing_date: self.pricing_date,
        }
    }
}

// ==========================================
// PricingResult - 计价结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResult {
    pub carrier_id: i64,
    pub rate_card_id: i64,
    pub zone_code: String,
    pub actual_weight: f64,
    pub volumetric_weight: f64,
    pub chargeable_weight: f64,
    pub matched_tier: MatchedTier,
    pub base_purchase: Decimal,
    pub base_sales: Decimal,
    pub surcharges: Vec<AppliedSurcharge>,
    pub surcharge_purchase: Decimal,
    pub surcharge_sales: Decimal,
    pub total_purchase: Decimal,
    pub total_sales: Decimal,
    pub profit: Decimal,
    pub profit_rate: Decimal, // 百分比
    pub currency: String,
    pub warnings: Vec<String>,
}

/// 命中的重量段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedTier {
    pub tier_id: i64,
    pub weight_from: f64,
    pub weight_to: f64,
    pub unit_purchase_price: Option<Decimal>,
    pub unit_sales_price: Option<Decimal>,
    pub price_unit: crate::domain::types::PriceUnit,
    pub is_overflow: bool,        // 超出最高重量段，沿用最高段价格
    pub overflow_weight: f64,     // 超出最高段上界的重量
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedSurcharge {
    pub code: String,
    pub name: String,
    pub charge_type: crate::domain::types::ChargeType,
    pub purchase_amount: Decimal,
    pub sales_amount: Decimal,
}

/// 多承运商报价中单个承运商的结果（失败时 error 为具体原因）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierQuote {
    pub carrier_id: i64,
    pub result: Option<PricingResult>,
    pub error: Option<String>,
}

impl CarrierQuote {
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}
