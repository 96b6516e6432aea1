// ==========================================
// 尾程运价引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含计价规则
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod rate_card_repo;
pub mod rate_card_repo_impl;
pub mod shipment_repo;
pub mod sql_values;
pub mod zone_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use rate_card_repo::RateCardRepository;
pub use rate_card_repo_impl::RateCardRepositoryImpl;
pub use shipment_repo::{ShipmentCostRepository, ShipmentCostRepositoryImpl};
pub use zone_repo::{ZoneRepository, ZoneRepositoryImpl};
