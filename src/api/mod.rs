// ==========================================
// 尾程运价引擎 - API 层
// ==========================================
// 职责: 提供导入/计价/利润分析接口，供 CLI 或外部服务调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod pricing_api;
pub mod profit_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportFileResponse};
pub use pricing_api::PricingApi;
pub use profit_api::ProfitApi;
