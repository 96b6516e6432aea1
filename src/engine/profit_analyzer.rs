// ==========================================
// 尾程运价引擎 - 利润分析
// ==========================================
// 职责: 价卡重量段毛利、运单利润按分区/按月汇总
// 红线: 只读聚合，不引入新的匹配逻辑；数据不足时返回 insufficient 报表而非错误
// ==========================================

use crate::domain::profit::{ProfitBucket, ShipmentProfitReport, TierMarginReport, ZoneTierMargin};
use crate::domain::rate::RateTier;
use crate::domain::shipment::ShipmentCostRecord;
use crate::engine::pricing::round_money;
use crate::repository::{RateCardRepository, RepositoryResult, ShipmentCostRepository};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// 默认最少有价重量段数
pub const DEFAULT_MIN_PRICED_TIERS: usize = 1;

/// 毛利率 = (销售 − 采购) / 采购 × 100；采购为 0 或溢出时返回 None
pub fn margin_rate(purchase: Decimal, sales: Decimal) -> Option<Decimal> {
    if purchase.is_zero() {
        None
    } else {
        sales
            .checked_sub(purchase)?
            .checked_div(purchase)?
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(round_money)
    }
}

/// 按毛利率反推销售价 = 采购 × (1 + 毛利率/100)
pub fn sales_price_from_margin(purchase: Decimal, margin_rate: Decimal) -> Decimal {
    round_money(purchase * (Decimal::ONE + margin_rate / Decimal::ONE_HUNDRED))
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        round_money(total / Decimal::from(count))
    }
}

fn zone_margin(zone_code: &str, tiers: &[&RateTier]) -> ZoneTierMargin {
    let priced: Vec<(Decimal, Decimal)> = tiers
        .iter()
        .filter_map(|t| Some((t.purchase_price?, t.sales_price?)))
        .collect();
    let rates: Vec<Decimal> = priced.iter().filter_map(|(p, s)| margin_rate(*p, *s)).collect();

    let total_purchase: Decimal = priced.iter().map(|(p, _)| *p).sum();
    let total_sales: Decimal = priced.iter().map(|(_, s)| *s).sum();

    ZoneTierMargin {
        zone_code: zone_code.to_string(),
        tier_count: tiers.len(),
        priced_tier_count: priced.len(),
        avg_purchase: average(total_purchase, priced.len()),
        avg_sales: average(total_sales, priced.len()),
        avg_profit: average(total_sales - total_purchase, priced.len()),
        avg_margin_rate: if rates.is_empty() {
            None
        } else {
            Some(average(rates.iter().sum(), rates.len()))
        },
        min_margin_rate: rates.iter().min().copied(),
        max_margin_rate: rates.iter().max().copied(),
    }
}

fn bucket(key: String, records: &[&ShipmentCostRecord]) -> ProfitBucket {
    let total_purchase: Decimal = records.iter().map(|r| r.purchase_amount).sum();
    let total_sales: Decimal = records.iter().map(|r| r.sales_amount).sum();
    let count = records.len();
    ProfitBucket {
        key,
        shipment_count: count,
        total_weight: records.iter().map(|r| r.chargeable_weight).sum(),
        total_purchase,
        total_sales,
        total_profit: total_sales - total_purchase,
        avg_purchase: average(total_purchase, count),
        avg_sales: average(total_sales, count),
        avg_profit: average(total_sales - total_purchase, count),
        margin_rate: margin_rate(total_purchase, total_sales),
    }
}

/// 按键分组汇总（BTreeMap 保证输出按键排序）
fn group_by<F>(records: &[ShipmentCostRecord], key_of: F) -> Vec<ProfitBucket>
where
    F: Fn(&ShipmentCostRecord) -> String,
{
    let mut groups: BTreeMap<String, Vec<&ShipmentCostRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(key_of(r)).or_default().push(r);
    }
    groups
        .into_iter()
        .map(|(key, rs)| bucket(key, &rs))
        .collect()
}

/// 价卡重量段毛利报表（纯函数）
pub fn build_tier_margin_report(
    rate_card_id: i64,
    tiers: &[RateTier],
    min_priced_tiers: usize,
) -> TierMarginReport {
    let mut by_zone: BTreeMap<&str, Vec<&RateTier>> = BTreeMap::new();
    for t in tiers {
        by_zone.entry(t.zone_code.as_str()).or_default().push(t);
    }
    let zones: Vec<ZoneTierMargin> = by_zone
        .into_iter()
        .map(|(zone, ts)| zone_margin(zone, &ts))
        .collect();
    let priced_tier_count = zones.iter().map(|z| z.priced_tier_count).sum::<usize>();
    let insufficient = priced_tier_count < min_priced_tiers.max(1);

    TierMarginReport {
        rate_card_id,
        zones,
        priced_tier_count,
        insufficient,
        message: insufficient.then(|| {
            format!(
                "有价重量段不足（{} < {}），无法给出毛利分布",
                priced_tier_count,
                min_priced_tiers.max(1)
            )
        }),
    }
}

/// 运单利润报表（纯函数）
pub fn build_shipment_report(
    carrier_id: i64,
    from: NaiveDate,
    to: NaiveDate,
    records: &[ShipmentCostRecord],
) -> ShipmentProfitReport {
    let by_zone = group_by(records, |r| r.zone_code.clone());
    let by_month = group_by(records, |r| {
        format!("{:04}-{:02}", r.shipped_on.year(), r.shipped_on.month())
    });
    let all: Vec<&ShipmentCostRecord> = records.iter().collect();
    let insufficient = records.is_empty();

    ShipmentProfitReport {
        carrier_id,
        from,
        to,
        by_zone,
        by_month,
        total: bucket("total".to_string(), &all),
        insufficient,
        message: insufficient.then(|| "区间内没有运单成本记录".to_string()),
    }
}

// ==========================================
// ProfitAnalyzer - 利润分析器
// ==========================================
pub struct ProfitAnalyzer {
    rate_card_repo: Arc<dyn RateCardRepository>,
    shipment_repo: Arc<dyn ShipmentCostRepository>,
    min_priced_tiers: usize,
}

impl ProfitAnalyzer {
    pub fn new(
        rate_card_repo: Arc<dyn RateCardRepository>,
        shipment_repo: Arc<dyn ShipmentCostRepository>,
    ) -> Self {
        Self {
            rate_card_repo,
            shipment_repo,
            min_priced_tiers: DEFAULT_MIN_PRICED_TIERS,
        }
    }

    pub fn with_min_priced_tiers(mut self, min_priced_tiers: usize) -> Self {
        self.min_priced_tiers = min_priced_tiers;
        self
    }

    /// 价卡各分区的重量段毛利
    #[instrument(skip(self))]
    pub async fn tier_margin_report(&self, rate_card_id: i64) -> RepositoryResult<TierMarginReport> {
        let tiers = self.rate_card_repo.find_tiers_by_card(rate_card_id).await?;
        let report = build_tier_margin_report(rate_card_id, &tiers, self.min_priced_tiers);
        info!(
            rate_card_id,
            zones = report.zones.len(),
            priced = report.priced_tier_count,
            insufficient = report.insufficient,
            "重量段毛利报表生成完成"
        );
        Ok(report)
    }

    /// 承运商在日期区间（含两端）内的运单利润
    #[instrument(skip(self))]
    pub async fn shipment_profit_report(
        &self,
        carrier_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepositoryResult<ShipmentProfitReport> {
        let records = self.shipment_repo.find_by_carrier(carrier_id, from, to).await?;
        let report = build_shipment_report(carrier_id, from, to, &records);
        info!(
            carrier_id,
            shipments = records.len(),
            zones = report.by_zone.len(),
            months = report.by_month.len(),
            "运单利润报表生成完成"
        );
        Ok(report)
    }
}
