// ==========================================
// 尾程运价引擎 - 计价引擎
// ==========================================
// 职责: 报价请求 → 计费重 → 分区 → 生效价卡 → 重量段 → 基础运费 → 附加费 → 利润
// 红线: 只读价卡/分区/配置，不修改任何共享数据
// 约定: 失败返回具体未满足的条件（PricingError），不返回笼统的"未找到"
// ==========================================

use crate::config::{ConfigError, RateConfigReader};
use crate::domain::quote::{
    AppliedSurcharge, CarrierQuote, Dimensions, MatchedTier, MultiQuoteRequest, PricingResult,
    QuoteRequest,
};
use crate::domain::rate::{RateCard, RateTier, Surcharge};
use crate::domain::types::{ChargeType, PriceUnit};
use crate::engine::zone_resolver::ZoneResolver;
use crate::repository::{RateCardRepository, RepositoryError, ZoneRepository};
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// 金额保留位数
pub const MONEY_DP: u32 = 2;
/// 计费重保留位数（转 Decimal 时去除浮点噪声）
pub const WEIGHT_DP: u32 = 3;

// ==========================================
// 错误类型
// ==========================================

/// 无匹配运价的具体原因
#[derive(Debug, Clone, PartialEq)]
pub enum NoMatchReason {
    /// 分区下没有任何重量段
    NoTiers,
    /// 重量低于最低重量段下界
    BelowLowestBand { lowest_from: f64 },
    /// 重量落在两个重量段之间的断档
    BandGap { from: f64, to: f64 },
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoMatchReason::NoTiers => write!(f, "分区未配置重量段"),
            NoMatchReason::BelowLowestBand { lowest_from } => {
                write!(f, "低于最低重量段下界 {}", lowest_from)
            }
            NoMatchReason::BandGap { from, to } => write!(f, "落在重量段断档 ({}, {})", from, to),
        }
    }
}

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("报价请求无效: {0}")]
    InvalidRequest(String),

    #[error("无法确定分区 (carrier_id={carrier_id}, postal_code={postal_code:?}, country={country_code:?})")]
    ZoneNotFound {
        carrier_id: i64,
        postal_code: Option<String>,
        country_code: Option<String>,
    },

    #[error("承运商 {carrier_id} 在 {date} 没有生效价卡")]
    NoActiveRateCard { carrier_id: i64, date: NaiveDate },

    #[error("价卡 {rate_card_id} 不存在或已停用")]
    RateCardInactive { rate_card_id: i64 },

    #[error("分区 {zone_code} 无匹配运价（计费重 {weight} kg）: {reason}")]
    NoMatchingRate {
        zone_code: String,
        weight: f64,
        reason: NoMatchReason,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type PricingOutcome = Result<PricingResult, PricingError>;

// ==========================================
// 纯计算函数
// ==========================================

/// 金额四舍五入到分
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// 体积重 = 长×宽×高 / 体积重系数
pub fn volumetric_weight(dimensions: Option<&Dimensions>, factor: f64) -> f64 {
    match dimensions {
        Some(d) if factor > 0.0 => d.volume_cm3() / factor,
        _ => 0.0,
    }
}

/// 重量段选择结果
#[derive(Debug, Clone, PartialEq)]
pub struct TierSelection<'a> {
    pub tier: &'a RateTier,
    pub is_overflow: bool,
    pub overflow_weight: f64,
}

/// 在单个分区的重量段中选择命中段
///
/// 1. 包含该重量的段中取上界最小者（边界重量归入较低段）
/// 2. 超过全部上界时沿用上界最大的段，并记录超出重量
/// 3. 其余情况返回断档/低于下界
pub fn select_tier(tiers: &[RateTier], weight: f64) -> Result<TierSelection<'_>, NoMatchReason> {
    if tiers.is_empty() {
        return Err(NoMatchReason::NoTiers);
    }

    let containing = tiers.iter().filter(|t| t.contains(weight)).min_by(|a, b| {
        a.weight_to
            .total_cmp(&b.weight_to)
            .then_with(|| a.weight_from.total_cmp(&b.weight_from))
    });
    if let Some(tier) = containing {
        return Ok(TierSelection {
            tier,
            is_overflow: false,
            overflow_weight: 0.0,
        });
    }

    let highest = tiers.iter().max_by(|a, b| {
        a.weight_to
            .total_cmp(&b.weight_to)
            .then_with(|| a.weight_from.total_cmp(&b.weight_from))
    });
    if let Some(tier) = highest {
        if weight > tier.weight_to {
            return Ok(TierSelection {
                tier,
                is_overflow: true,
                overflow_weight: weight - tier.weight_to,
            });
        }
    }

    let lowest_from = tiers
        .iter()
        .map(|t| t.weight_from)
        .fold(f64::INFINITY, f64::min);
    if weight < lowest_from {
        return Err(NoMatchReason::BelowLowestBand { lowest_from });
    }

    let gap_from = tiers
        .iter()
        .map(|t| t.weight_to)
        .filter(|to| *to < weight)
        .fold(lowest_from, f64::max);
    let gap_to = tiers
        .iter()
        .map(|t| t.weight_from)
        .filter(|from| *from > weight)
        .fold(f64::INFINITY, f64::min);
    Err(NoMatchReason::BandGap {
        from: gap_from,
        to: gap_to,
    })
}

/// 单侧基础运费（per_kg 乘计费重，再应用最低收费）
///
/// 乘积超出 Decimal 表示范围时返回 None
pub fn base_amount(
    unit_price: Decimal,
    unit: PriceUnit,
    chargeable_weight: Decimal,
    minimum: Option<Decimal>,
) -> Option<Decimal> {
    let amount = match unit {
        PriceUnit::PerKg => unit_price.checked_mul(chargeable_weight)?,
        PriceUnit::PerShipment => unit_price,
    };
    let amount = match minimum {
        Some(min) if amount < min => min,
        _ => amount,
    };
    Some(round_money(amount))
}

/// 应用强制附加费（两侧各按本侧基础运费计算百分比）
///
/// 任一金额溢出时返回 None
pub fn apply_surcharges(
    surcharges: &[Surcharge],
    base_purchase: Decimal,
    base_sales: Decimal,
) -> Option<Vec<AppliedSurcharge>> {
    surcharges
        .iter()
        .filter(|s| s.is_mandatory)
        .map(|s| {
            let (purchase_amount, sales_amount) = match s.charge_type {
                ChargeType::Fixed => (
                    s.purchase_amount.unwrap_or(Decimal::ZERO),
                    s.sales_amount.unwrap_or(Decimal::ZERO),
                ),
                ChargeType::Percentage => {
                    let rate = s
                        .percentage
                        .unwrap_or(Decimal::ZERO)
                        .checked_div(Decimal::ONE_HUNDRED)?;
                    (base_purchase.checked_mul(rate)?, base_sales.checked_mul(rate)?)
                }
            };
            Some(AppliedSurcharge {
                code: s.code.clone(),
                name: s.name.clone(),
                charge_type: s.charge_type,
                purchase_amount: round_money(purchase_amount),
                sales_amount: round_money(sales_amount),
            })
        })
        .collect()
}

/// 利润率（%），采购总额为 0 时返回 0；溢出返回 None
pub fn profit_rate(profit: Decimal, total_purchase: Decimal) -> Option<Decimal> {
    if total_purchase.is_zero() {
        Some(Decimal::ZERO)
    } else {
        profit
            .checked_div(total_purchase)?
            .checked_mul(Decimal::ONE_HUNDRED)
            .map(round_money)
    }
}

fn checked_sum<'a>(mut amounts: impl Iterator<Item = &'a Decimal>) -> Option<Decimal> {
    amounts.try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
}

fn amount_overflow(chargeable_weight: f64) -> PricingError {
    PricingError::InvalidRequest(format!(
        "金额超出可计算范围（计费重 {} kg）",
        chargeable_weight
    ))
}

fn validate_request(request: &QuoteRequest) -> Result<(), PricingError> {
    if !request.weight_kg.is_finite() || request.weight_kg <= 0.0 {
        return Err(PricingError::InvalidRequest(format!(
            "重量必须为正数: {}",
            request.weight_kg
        )));
    }
    if let Some(d) = &request.dimensions {
        let sides = [d.length_cm, d.width_cm, d.height_cm];
        if sides.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(PricingError::InvalidRequest(
                "尺寸（长/宽/高）必须为正数".to_string(),
            ));
        }
    }
    let has_zone = request
        .zone_code
        .as_deref()
        .is_some_and(|z| !z.trim().is_empty());
    let has_destination = request
        .postal_code
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty())
        || request
            .country_code
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
    if !has_zone && !has_destination {
        return Err(PricingError::InvalidRequest(
            "需提供分区代码或目的地邮编/国家".to_string(),
        ));
    }
    Ok(())
}

// ==========================================
// PricingEngine - 计价引擎
// ==========================================
pub struct PricingEngine {
    rate_card_repo: Arc<dyn RateCardRepository>,
    zone_repo: Arc<dyn ZoneRepository>,
    config: Arc<dyn RateConfigReader>,
    zone_resolver: ZoneResolver,
}

impl PricingEngine {
    pub fn new(
        rate_card_repo: Arc<dyn RateCardRepository>,
        zone_repo: Arc<dyn ZoneRepository>,
        config: Arc<dyn RateConfigReader>,
    ) -> Self {
        Self {
            rate_card_repo,
            zone_repo,
            config,
            zone_resolver: ZoneResolver::new(),
        }
    }

    /// 单承运商报价（含强制附加费）
    #[instrument(skip(self, request), fields(carrier_id = request.carrier_id, weight = request.weight_kg))]
    pub async fn calculate_freight(&self, request: &QuoteRequest) -> PricingOutcome {
        self.calculate(request, true).await
    }

    /// 快速报价（不计附加费）
    #[instrument(skip(self, request), fields(carrier_id = request.carrier_id, weight = request.weight_kg))]
    pub async fn quick_quote(&self, request: &QuoteRequest) -> PricingOutcome {
        self.calculate(request, false).await
    }

    /// 多承运商报价
    ///
    /// # 返回
    /// - 成功结果按采购总额升序，失败结果排在最后
    /// - Err: 请求本身无效或承运商列表读取失败
    #[instrument(skip(self, request), fields(carriers = request.carrier_ids.len(), weight = request.weight_kg))]
    pub async fn calculate_multi_carrier_quotes(
        &self,
        request: &MultiQuoteRequest,
    ) -> Result<Vec<CarrierQuote>, PricingError> {
        let start_time = Instant::now();
        validate_request(&request.for_carrier(0))?;

        let on = request.pricing_date.unwrap_or_else(|| Utc::now().date_naive());
        let carrier_ids = if request.carrier_ids.is_empty() {
            self.rate_card_repo.list_active_carriers(on).await?
        } else {
            request.carrier_ids.clone()
        };

        let futures = carrier_ids.iter().map(|&carrier_id| {
            let single = request.for_carrier(carrier_id);
            async move {
                let outcome = self.calculate(&single, true).await;
                (carrier_id, outcome)
            }
        });
        let outcomes = join_all(futures).await;

        let mut quotes: Vec<CarrierQuote> = outcomes
            .into_iter()
            .map(|(carrier_id, outcome)| match outcome {
                Ok(result) => CarrierQuote {
                    carrier_id,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    debug!(carrier_id, error = %e, "承运商报价失败");
                    CarrierQuote {
                        carrier_id,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect();

        quotes.sort_by(|a, b| match (&a.result, &b.result) {
            (Some(ra), Some(rb)) => ra
                .total_purchase
                .cmp(&rb.total_purchase)
                .then_with(|| a.carrier_id.cmp(&b.carrier_id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.carrier_id.cmp(&b.carrier_id),
        });

        info!(
            carriers = quotes.len(),
            success = quotes.iter().filter(|q| q.is_success()).count(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "多承运商报价完成"
        );
        Ok(quotes)
    }

    /// 解析价卡：显式价卡需为 active；否则取承运商在计价日的生效价卡
    async fn resolve_rate_card(
        &self,
        request: &QuoteRequest,
        on: NaiveDate,
    ) -> Result<RateCard, PricingError> {
        match request.rate_card_id {
            Some(rate_card_id) => match self.rate_card_repo.find_rate_card(rate_card_id).await? {
                Some(card) if card.is_active() => Ok(card),
                _ => Err(PricingError::RateCardInactive { rate_card_id }),
            },
            None => self
                .rate_card_repo
                .find_active_rate_card(request.carrier_id, on)
                .await?
                .ok_or(PricingError::NoActiveRateCard {
                    carrier_id: request.carrier_id,
                    date: on,
                }),
        }
    }

    async fn resolve_zone(&self, carrier_id: i64, request: &QuoteRequest) -> Result<String, PricingError> {
        if let Some(code) = request.zone_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            return Ok(code.to_string());
        }

        let zones = self.zone_repo.list_zones(carrier_id).await?;
        self.zone_resolver
            .resolve(
                &zones,
                request.postal_code.as_deref(),
                request.country_code.as_deref(),
            )
            .map(|m| m.zone.zone_code.clone())
            .ok_or_else(|| PricingError::ZoneNotFound {
                carrier_id,
                postal_code: request.postal_code.clone(),
                country_code: request.country_code.clone(),
            })
    }

    async fn calculate(&self, request: &QuoteRequest, include_surcharges: bool) -> PricingOutcome {
        validate_request(request)?;
        let on = request.pricing_date.unwrap_or_else(|| Utc::now().date_naive());

        // === 步骤 1: 计费重 ===
        let factor = self.config.get_volumetric_factor().await?;
        let volumetric = volumetric_weight(request.dimensions.as_ref(), factor);
        let chargeable = request.weight_kg.max(volumetric);

        // === 步骤 2-3: 显式价卡优先决定承运商，再解析分区与生效价卡 ===
        let explicit_card = match request.rate_card_id {
            Some(_) => Some(self.resolve_rate_card(request, on).await?),
            None => None,
        };
        let carrier_id = explicit_card
            .as_ref()
            .map_or(request.carrier_id, |c| c.carrier_id);
        let zone_code = self.resolve_zone(carrier_id, request).await?;
        let card = match explicit_card {
            Some(card) => card,
            None => self.resolve_rate_card(request, on).await?,
        };

        // === 步骤 4: 重量段 ===
        let tiers = self
            .rate_card_repo
            .find_tiers(card.rate_card_id, &zone_code)
            .await?;
        let selection = select_tier(&tiers, chargeable).map_err(|reason| {
            warn!(zone = %zone_code, chargeable_weight = chargeable, reason = %reason, "无匹配重量段");
            PricingError::NoMatchingRate {
                zone_code: zone_code.clone(),
                weight: chargeable,
                reason,
            }
        })?;
        let tier = selection.tier;

        // === 步骤 5: 基础运费 ===
        let mut warnings = Vec::new();
        if selection.is_overflow {
            warnings.push(format!(
                "计费重超出最高重量段上界 {} kg，沿用该段价格（超出 {} kg）",
                tier.weight_to, selection.overflow_weight
            ));
        }
        let unit_purchase = tier.purchase_price.unwrap_or_else(|| {
            warnings.push("重量段未配置采购价，采购侧按 0 计".to_string());
            Decimal::ZERO
        });
        let unit_sales = tier.sales_price.unwrap_or_else(|| {
            warnings.push("重量段未配置销售价，销售侧按 0 计".to_string());
            Decimal::ZERO
        });
        let weight_decimal = Decimal::from_f64(chargeable)
            .map(|w| w.round_dp(WEIGHT_DP))
            .ok_or_else(|| PricingError::InvalidRequest(format!("计费重无法计算: {}", chargeable)))?;
        let base_purchase = base_amount(
            unit_purchase,
            tier.price_unit,
            weight_decimal,
            tier.min_purchase_charge,
        )
        .ok_or_else(|| amount_overflow(chargeable))?;
        let base_sales = base_amount(unit_sales, tier.price_unit, weight_decimal, tier.min_sales_charge)
            .ok_or_else(|| amount_overflow(chargeable))?;

        // === 步骤 6: 附加费 ===
        let surcharges = if include_surcharges {
            let defined = self.rate_card_repo.find_surcharges(card.rate_card_id).await?;
            apply_surcharges(&defined, base_purchase, base_sales)
                .ok_or_else(|| amount_overflow(chargeable))?
        } else {
            Vec::new()
        };
        let surcharge_purchase = checked_sum(surcharges.iter().map(|s| &s.purchase_amount))
            .ok_or_else(|| amount_overflow(chargeable))?;
        let surcharge_sales = checked_sum(surcharges.iter().map(|s| &s.sales_amount))
            .ok_or_else(|| amount_overflow(chargeable))?;

        // === 步骤 7: 合计与利润 ===
        let total_purchase = base_purchase
            .checked_add(surcharge_purchase)
            .map(round_money)
            .ok_or_else(|| amount_overflow(chargeable))?;
        let total_sales = base_sales
            .checked_add(surcharge_sales)
            .map(round_money)
            .ok_or_else(|| amount_overflow(chargeable))?;
        let profit = total_sales
            .checked_sub(total_purchase)
            .ok_or_else(|| amount_overflow(chargeable))?;
        let rate =
            profit_rate(profit, total_purchase).ok_or_else(|| amount_overflow(chargeable))?;

        info!(
            carrier_id,
            rate_card_id = card.rate_card_id,
            zone = %zone_code,
            chargeable_weight = chargeable,
            overflow = selection.is_overflow,
            total_purchase = %total_purchase,
            total_sales = %total_sales,
            "计价完成"
        );

        Ok(PricingResult {
            carrier_id,
            rate_card_id: card.rate_card_id,
            zone_code,
            actual_weight: request.weight_kg,
            volumetric_weight: volumetric,
            chargeable_weight: chargeable,
            matched_tier: MatchedTier {
                tier_id: tier.tier_id,
                weight_from: tier.weight_from,
                weight_to: tier.weight_to,
                unit_purchase_price: tier.purchase_price,
                unit_sales_price: tier.sales_price,
                price_unit: tier.price_unit,
                is_overflow: selection.is_overflow,
                overflow_weight: selection.overflow_weight,
            },
            base_purchase,
            base_sales,
            surcharges,
            surcharge_purchase,
            surcharge_sales,
            total_purchase,
            total_sales,
            profit,
            profit_rate: rate,
            currency: card.currency,
            warnings,
        })
    }
}
