// ==========================================
// 尾程运价引擎 - 核心库
// ==========================================
// 范围: 承运商价卡导入（多版式解析、结构推断、归一化、校验）与报价计价
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 计价与利润分析
pub mod engine;

// 导入层 - 价卡文件
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建库）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组件装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ChargeType, ColumnRole, PriceUnit, RateCardStatus, SheetFormat, ValidationStatus,
};

// 领域实体
pub use domain::{
    ImportPreview, ParseResult, PricingResult, QuoteRequest, RateCard, RateTier,
    RateTierCandidate, RawTable, Zone,
};

// 引擎
pub use engine::{PricingEngine, PricingError, ProfitAnalyzer, ZoneResolver};

// 导入
pub use importer::{ImportError, RateImporter, RateImporterImpl};

// API
pub use api::{ApiError, ImportApi, PricingApi, ProfitApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "尾程运价引擎";
