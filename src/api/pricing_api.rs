// ==========================================
// 计价API
// ==========================================
// 职责: 单承运商报价、多承运商比价、快速报价
// ==========================================

use crate::api::error::ApiResult;
use crate::domain::quote::{CarrierQuote, MultiQuoteRequest, PricingResult, QuoteRequest};
use crate::engine::PricingEngine;
use std::sync::Arc;

pub struct PricingApi {
    engine: Arc<PricingEngine>,
}

impl PricingApi {
    pub fn new(engine: Arc<PricingEngine>) -> Self {
        Self { engine }
    }

    /// 单承运商报价（含强制附加费）
    pub async fn calculate_freight(&self, request: &QuoteRequest) -> ApiResult<PricingResult> {
        Ok(self.engine.calculate_freight(request).await?)
    }

    /// 多承运商报价（成功结果按采购总额升序，失败在后）
    pub async fn calculate_multi_carrier_quotes(
        &self,
        request: &MultiQuoteRequest,
    ) -> ApiResult<Vec<CarrierQuote>> {
        Ok(self.engine.calculate_multi_carrier_quotes(request).await?)
    }

    /// 快速报价：只需分区/目的地与重量，不计附加费
    pub async fn quick_quote(
        &self,
        carrier_id: i64,
        zone_code: Option<String>,
        postal_code: Option<String>,
        country_code: Option<String>,
        weight_kg: f64,
    ) -> ApiResult<PricingResult> {
        let request = QuoteRequest {
            carrier_id,
            zone_code,
            postal_code,
            country_code,
            weight_kg,
            ..QuoteRequest::default()
        };
        Ok(self.engine.quick_quote(&request).await?)
    }
}
