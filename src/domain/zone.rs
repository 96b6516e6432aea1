// ==========================================
// 尾程运价引擎 - 分区领域模型
// ==========================================
// 职责: 承运商分区及其匹配规则（邮编前缀 / 国家代码）
// 约束: 前缀与国家列表在仓储边界完成反序列化，匹配逻辑只见强类型集合
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub zone_id: i64,
    pub carrier_id: i64,
    pub zone_code: String,
    pub zone_name: String,
    pub postal_prefixes: Vec<String>,    // 按配置顺序
    pub country_codes: BTreeSet<String>, // 大写 ISO 代码
    pub priority: i32,                   // 越小越先匹配
}

impl Zone {
    /// 邮编是否命中任一前缀（邮编需已规范化）
    pub fn matches_postal(&self, postal_code: &str) -> bool {
        !postal_code.is_empty()
            && self
                .postal_prefixes
                .iter()
                .any(|p| !p.is_empty() && postal_code.starts_with(p.as_str()))
    }

    pub fn matches_country(&self, country_code: &str) -> bool {
        !country_code.is_empty() && self.country_codes.contains(country_code)
    }
}

/// 邮编规范化：去空白、转大写
pub fn normalize_postal_code(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

pub fn normalize_country_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}
