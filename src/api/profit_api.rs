// ==========================================
// 利润分析API
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::profit::{ShipmentProfitReport, TierMarginReport};
use crate::engine::ProfitAnalyzer;
use chrono::NaiveDate;
use std::sync::Arc;

pub struct ProfitApi {
    analyzer: Arc<ProfitAnalyzer>,
}

impl ProfitApi {
    pub fn new(analyzer: Arc<ProfitAnalyzer>) -> Self {
        Self { analyzer }
    }

    /// 价卡重量段毛利报表
    pub async fn tier_margin_report(&self, rate_card_id: i64) -> ApiResult<TierMarginReport> {
        Ok(self.analyzer.tier_margin_report(rate_card_id).await?)
    }

    /// 承运商运单利润报表（按分区 / 按月）
    pub async fn shipment_profit_report(
        &self,
        carrier_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ApiResult<ShipmentProfitReport> {
        if to < from {
            return Err(ApiError::InvalidInput(format!(
                "日期区间无效: {} ~ {}",
                from, to
            )));
        }
        Ok(self
            .analyzer
            .shipment_profit_report(carrier_id, from, to)
            .await?)
    }
}
