// ==========================================
// 尾程运价引擎 - 价卡 Repository Trait
// ==========================================
// 职责: 定义价卡/重量段/附加费数据访问接口（不包含实现）
// 红线: Repository 不含计价规则，只做数据读写
// ==========================================

use crate::domain::rate::{
    NewRateTier, RateCard, RateCardInfo, RateCardWriteSummary, RateTier, Surcharge,
};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDate;

// ==========================================
// RateCardRepository Trait
// ==========================================
// 用途: 价卡读写
// 实现者: RateCardRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait RateCardRepository: Send + Sync {
    // ===== 写入（事务化）=====

    /// 写入价卡头 + 重量段 + 附加费（单事务）
    ///
    /// # 返回
    /// - Ok(RateCardWriteSummary): 单行重量段写入失败计入 fail_count，不中断
    /// - Err: 价卡头或附加费写入失败（整个事务回滚，不留任何重量段）
    ///
    /// # 说明
    /// - info.is_default 为 true 时，同事务内清除该承运商原默认价卡标记
    async fn create_rate_card_with_tiers(
        &self,
        info: &RateCardInfo,
        tiers: Vec<NewRateTier>,
    ) -> RepositoryResult<RateCardWriteSummary>;

    /// 停用价卡（生命周期结束）
    ///
    /// # 返回
    /// - Err(NotFound): 价卡不存在
    async fn deactivate_rate_card(&self, rate_card_id: i64) -> RepositoryResult<()>;

    // ===== 查询 =====

    async fn find_rate_card(&self, rate_card_id: i64) -> RepositoryResult<Option<RateCard>>;

    /// 查询承运商在指定日期生效的价卡
    ///
    /// # 规则
    /// 1. 有效期覆盖 on 的 active 默认价卡
    /// 2. 否则有效期覆盖 on 的最新创建 active 价卡
    async fn find_active_rate_card(
        &self,
        carrier_id: i64,
        on: NaiveDate,
    ) -> RepositoryResult<Option<RateCard>>;

    /// 承运商全部价卡（最新在前）
    async fn list_rate_cards(&self, carrier_id: i64) -> RepositoryResult<Vec<RateCard>>;

    /// 在指定日期有生效价卡的承运商
    async fn list_active_carriers(&self, on: NaiveDate) -> RepositoryResult<Vec<i64>>;

    /// 价卡在某分区的全部重量段（按 weight_from, weight_to 升序）
    async fn find_tiers(&self, rate_card_id: i64, zone_code: &str)
        -> RepositoryResult<Vec<RateTier>>;

    /// 价卡在某分区包含该重量的重量段（上界含，按 weight_from 升序）
    async fn find_tiers_for_weight(
        &self,
        rate_card_id: i64,
        zone_code: &str,
        weight: f64,
    ) -> RepositoryResult<Vec<RateTier>>;

    /// 价卡全部重量段（按 zone_code, weight_from 升序）
    async fn find_tiers_by_card(&self, rate_card_id: i64) -> RepositoryResult<Vec<RateTier>>;

    async fn find_surcharges(&self, rate_card_id: i64) -> RepositoryResult<Vec<Surcharge>>;
}
