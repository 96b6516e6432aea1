// ==========================================
// 尾程运价引擎 - 引擎层
// ==========================================
// 职责: 分区解析、计价、利润分析
// 红线: Engine 不拼 SQL，数据一律经 Repository 读取
// ==========================================

pub mod pricing;
pub mod profit_analyzer;
pub mod zone_resolver;

// 重导出核心引擎
pub use pricing::{NoMatchReason, PricingEngine, PricingError, PricingOutcome};
pub use profit_analyzer::{margin_rate, sales_price_from_margin, ProfitAnalyzer};
pub use zone_resolver::{ZoneMatch, ZoneMatchKind, ZoneResolver};
