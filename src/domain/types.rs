// ==========================================
// 尾程运价引擎 - 领域类型定义
// ==========================================
// 职责: 价卡导入与计价共用的枚举类型
// 序列化: 与数据库/前端约定的字符串保持一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 价卡版式 (Sheet Format)
// ==========================================
// matrix: 列头为分区、行头为重量段
// list:   每行一条 (分区, 重量段, 价格)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    Matrix,
    List,
    Unknown,
}

impl fmt::Display for SheetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetFormat::Matrix => write!(f, "matrix"),
            SheetFormat::List => write!(f, "list"),
            SheetFormat::Unknown => write!(f, "unknown"),
        }
    }
}

// ==========================================
// 列语义角色 (Column Role)
// ==========================================
// Price 为泛指价格列，映射后处理中默认归为采购价
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnRole {
    Zone,
    WeightFrom,
    WeightTo,
    Weight,
    PurchasePrice,
    SalesPrice,
    Price,
    Currency,
    Service,
}

impl ColumnRole {
    /// 全部角色（评分时的遍历顺序，同分时靠前者优先）
    pub const ALL: [ColumnRole; 9] = [
        ColumnRole::Zone,
        ColumnRole::WeightFrom,
        ColumnRole::WeightTo,
        ColumnRole::Weight,
        ColumnRole::PurchasePrice,
        ColumnRole::SalesPrice,
        ColumnRole::Price,
        ColumnRole::Currency,
        ColumnRole::Service,
    ];

    pub fn is_price(&self) -> bool {
        matches!(
            self,
            ColumnRole::PurchasePrice | ColumnRole::SalesPrice | ColumnRole::Price
        )
    }

    pub fn is_weight(&self) -> bool {
        matches!(
            self,
            ColumnRole::WeightFrom | ColumnRole::WeightTo | ColumnRole::Weight
        )
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnRole::Zone => "zone",
            ColumnRole::WeightFrom => "weightFrom",
            ColumnRole::WeightTo => "weightTo",
            ColumnRole::Weight => "weight",
            ColumnRole::PurchasePrice => "purchasePrice",
            ColumnRole::SalesPrice => "salesPrice",
            ColumnRole::Price => "price",
            ColumnRole::Currency => "currency",
            ColumnRole::Service => "service",
        };
        write!(f, "{}", name)
    }
}

// ==========================================
// 计价单位 (Price Unit)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    PerKg,       // 单价 × 计费重
    PerShipment, // 每票一口价
}

impl PriceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceUnit::PerKg => "per_kg",
            PriceUnit::PerShipment => "per_shipment",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "per_kg" | "kg" => Some(PriceUnit::PerKg),
            "per_shipment" | "shipment" => Some(PriceUnit::PerShipment),
            _ => None,
        }
    }
}

impl Default for PriceUnit {
    fn default() -> Self {
        PriceUnit::PerShipment
    }
}

impl fmt::Display for PriceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 附加费类型 (Charge Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeType {
    Fixed,      // 固定金额
    Percentage, // 按基础运费百分比
}

impl ChargeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeType::Fixed => "fixed",
            ChargeType::Percentage => "percentage",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "fixed" => Some(ChargeType::Fixed),
            "percentage" | "percent" => Some(ChargeType::Percentage),
            _ => None,
        }
    }
}

impl fmt::Display for ChargeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 价卡状态 (Rate Card Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateCardStatus {
    Active,
    Inactive,
}

impl RateCardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateCardStatus::Active => "active",
            RateCardStatus::Inactive => "inactive",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "active" => Some(RateCardStatus::Active),
            "inactive" => Some(RateCardStatus::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for RateCardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 校验问题级别 (Issue Level)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Error,   // 该行不可导入
    Warning, // 允许导入，需人工复核
}

// ==========================================
// 校验总体状态（供前端着色）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Success,
    Warning,
    Error,
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStatus::Success => write!(f, "success"),
            ValidationStatus::Warning => write!(f, "warning"),
            ValidationStatus::Error => write!(f, "error"),
        }
    }
}

// ==========================================
// 原始表格来源 (Source Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Csv,
    Excel,
    Ocr,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Csv => write!(f, "csv"),
            SourceKind::Excel => write!(f, "excel"),
            SourceKind::Ocr => write!(f, "ocr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_unit_roundtrip_db_string() {
        assert_eq!(PriceUnit::parse("per_kg"), Some(PriceUnit::PerKg));
        assert_eq!(PriceUnit::parse(" PER_SHIPMENT "), Some(PriceUnit::PerShipment));
        assert_eq!(PriceUnit::parse("per_pallet"), None);
        assert_eq!(PriceUnit::default(), PriceUnit::PerShipment);
    }

    #[test]
    fn test_column_role_serde_camel_case() {
        let json = serde_json::to_string(&ColumnRole::PurchasePrice).unwrap();
        assert_eq!(json, "\"purchasePrice\"");
        assert_eq!(ColumnRole::WeightFrom.to_string(), "weightFrom");
    }

    #[test]
    fn test_role_families() {
        assert!(ColumnRole::SalesPrice.is_price());
        assert!(ColumnRole::Weight.is_weight());
        assert!(!ColumnRole::Zone.is_price());
    }
}
