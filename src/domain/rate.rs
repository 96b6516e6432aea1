// ==========================================
// 尾程运价引擎 - 价卡领域模型
// ==========================================
// 职责: 重量段候选记录、持久化价卡/重量段/附加费
// 约束: 同一价卡内 (zone, weight_from, weight_to) 唯一且同分区不重叠
// ==========================================

use crate::domain::types::{ChargeType, PriceUnit, RateCardStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 开放上限重量段（"N+"/"over N"）的哨兵上界
pub const OPEN_ENDED_WEIGHT: f64 = 9999.0;

// ==========================================
// RateTierCandidate - 重量段候选记录
// ==========================================
// 用途: RateNormalizer 产出，RateValidator 消费
// 生命周期: 仅在导入预览流程内
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTierCandidate {
    pub zone_code: String,
    pub weight_from: Option<f64>,         // 下界（含）
    pub weight_to: Option<f64>,           // 上界（含）
    pub purchase_price: Option<Decimal>,  // 采购价
    pub sales_price: Option<Decimal>,     // 销售价
    pub price_unit: PriceUnit,
    pub currency: Option<String>,
    pub service_type: Option<String>,
    pub row_number: usize, // 源文件行号
}

impl RateTierCandidate {
    /// 去重键：(分区, 下界, 上界)
    pub fn band_key(&self) -> Option<(String, f64, f64)> {
        match (self.weight_from, self.weight_to) {
            (Some(from), Some(to)) => Some((self.zone_code.trim().to_string(), from, to)),
            _ => None,
        }
    }
}

// ==========================================
// RateTier - 已持久化重量段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTier {
    pub tier_id: i64,
    pub rate_card_id: i64,
    pub zone_code: String,
    pub weight_from: f64,
    pub weight_to: f64,
    pub purchase_price: Option<Decimal>,
    pub sales_price: Option<Decimal>,
    pub price_unit: PriceUnit,
    pub min_purchase_charge: Option<Decimal>, // 采购侧最低收费
    pub min_sales_charge: Option<Decimal>,    // 销售侧最低收费
}

impl RateTier {
    /// 重量是否落在 [weight_from, weight_to]（上界含）
    pub fn contains(&self, weight: f64) -> bool {
        weight >= self.weight_from && weight <= self.weight_to
    }
}

/// 待写入的重量段（尚无存储 ID）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRateTier {
    pub zone_code: String,
    pub weight_from: f64,
    pub weight_to: f64,
    pub purchase_price: Option<Decimal>,
    pub sales_price: Option<Decimal>,
    pub price_unit: PriceUnit,
    pub min_purchase_charge: Option<Decimal>,
    pub min_sales_charge: Option<Decimal>,
    pub row_number: usize,
}

impl NewRateTier {
    /// 由通过校验的候选记录转换；缺重量段时返回 None
    pub fn from_candidate(candidate: &RateTierCandidate) -> Option<Self> {
        Some(Self {
            zone_code: candidate.zone_code.trim().to_string(),
            weight_from: candidate.weight_from?,
            weight_to: candidate.weight_to?,
            purchase_price: candidate.purchase_price,
            sales_price: candidate.sales_price,
            price_unit: candidate.price_unit,
            min_purchase_charge: None,
            min_sales_charge: None,
            row_number: candidate.row_number,
        })
    }
}

// ==========================================
// RateCard - 价卡头
// ==========================================
// 重新导入时生成新价卡替代旧价卡，不修改旧价卡的重量段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCard {
    pub rate_card_id: i64,
    pub carrier_id: i64,
    pub card_code: String,
    pub card_name: String,
    pub card_type: String,
    pub service_type: Option<String>,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>, // None = 长期有效
    pub currency: String,
    pub status: RateCardStatus,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl RateCard {
    /// 有效期是否覆盖指定日期
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && self.valid_to.map_or(true, |to| date <= to)
    }

    pub fn is_active(&self) -> bool {
        self.status == RateCardStatus::Active
    }
}

/// 确认导入时的价卡头信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCardInfo {
    pub carrier_id: i64,
    pub card_code: String,
    pub card_name: String,
    pub card_type: String,
    pub service_type: Option<String>,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub currency: String,
    pub is_default: bool,
    #[serde(default)]
    pub surcharges: Vec<NewSurcharge>,
}

// ==========================================
// Surcharge - 附加费
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surcharge {
    pub surcharge_id: i64,
    pub rate_card_id: i64,
    pub code: String,
    pub name: String,
    pub charge_type: ChargeType,
    pub purchase_amount: Option<Decimal>, // fixed: 采购侧金额
    pub sales_amount: Option<Decimal>,    // fixed: 销售侧金额
    pub percentage: Option<Decimal>,      // percentage: 两侧各按本侧基础运费计算
    pub is_mandatory: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSurcharge {
    pub code: String,
    pub name: String,
    pub charge_type: ChargeType,
    pub purchase_amount: Option<Decimal>,
    pub sales_amount: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub is_mandatory: bool,
}

/// 价卡写入结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCardWriteSummary {
    pub rate_card_id: i64,
    pub success_count: usize,
    pub fail_count: usize,
    pub failures: Vec<TierWriteFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierWriteFailure {
    pub row_number: usize,
    pub zone_code: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(valid_from: NaiveDate, valid_to: Option<NaiveDate>) -> RateCard {
        RateCard {
            rate_card_id: 1,
            carrier_id: 1,
            card_code: "C1".to_string(),
            card_name: "test".to_string(),
            card_type: "last_mile".to_string(),
            service_type: None,
            valid_from,
            valid_to,
            currency: "EUR".to_string(),
            status: RateCardStatus::Active,
            is_default: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_rate_card_covers_open_window() {
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let c = card(from, None);
        assert!(c.covers(NaiveDate::from_ymd_opt(2030, 6, 1).unwrap()));
        assert!(!c.covers(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    }

    #[test]
    fn test_rate_card_covers_closed_window_inclusive() {
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        let c = card(from, Some(to));
        assert!(c.covers(to));
        assert!(!c.covers(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    }

    #[test]
    fn test_new_tier_requires_band() {
        let candidate = RateTierCandidate {
            zone_code: " A ".to_string(),
            weight_from: Some(0.0),
            weight_to: None,
            purchase_price: None,
            sales_price: None,
            price_unit: PriceUnit::PerShipment,
            currency: None,
            service_type: None,
            row_number: 2,
        };
        assert!(NewRateTier::from_candidate(&candidate).is_none());
    }
}
