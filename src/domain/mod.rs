// ==========================================
// 尾程运价引擎 - 领域模型层
// ==========================================
// 职责: 定义原始表格、价卡、分区、报价等实体与类型
// 红线: 不含数据访问逻辑,不含计价逻辑
// ==========================================

pub mod import;
pub mod profit;
pub mod quote;
pub mod rate;
pub mod shipment;
pub mod table;
pub mod types;
pub mod zone;

// 重导出核心类型
pub use import::{
    BandIssue, ContinuityReport, DuplicateTier, FullValidation, ImportOptions, ImportPreview,
    ImportSummary, NormalizeOptions, ParseResult, RecordValidation, RowIssue, ValidationOptions,
};
pub use profit::{ProfitBucket, ShipmentProfitReport, TierMarginReport, ZoneTierMargin};
pub use quote::{
    AppliedSurcharge, CarrierQuote, Dimensions, MatchedTier, MultiQuoteRequest, PricingResult,
    QuoteRequest,
};
pub use rate::{
    NewRateTier, NewSurcharge, RateCard, RateCardInfo, RateCardWriteSummary, RateTier,
    RateTierCandidate, Surcharge, TierWriteFailure, OPEN_ENDED_WEIGHT,
};
pub use shipment::ShipmentCostRecord;
pub use table::{
    ColumnMapping, DataRow, FormatDetection, FormatHints, HeaderCell, MappedColumn,
    MappingValidation, RawTable, UnmappedColumn,
};
pub use types::{
    ChargeType, ColumnRole, IssueLevel, PriceUnit, RateCardStatus, SheetFormat, SourceKind,
    ValidationStatus,
};
pub use zone::Zone;
