// ==========================================
// 尾程运价引擎 - 列映射器实现
// ==========================================
// 职责: list 版式下，按表头文本 + 样本内容为每列打分，推断语义角色
// 评分: 关键词 +0.6 / 正则 +0.4 / 不足 0.5 时按样本内容补分（至多 +0.5）
// ==========================================

use crate::domain::table::{
    ColumnMapping, MappedColumn, MappingValidation, RawTable, UnmappedColumn,
};
use crate::domain::types::{ColumnRole, SheetFormat};
use crate::importer::rate_importer_trait::ColumnMapper as ColumnMapperTrait;
use crate::importer::value_parser::{is_numeric_value, is_weight_range_value, is_zone_like_value};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

/// 表头包含角色关键词
pub const KEYWORD_SCORE: f64 = 0.6;
/// 表头匹配角色正则
pub const PATTERN_SCORE: f64 = 0.4;
/// 低于该分数时启用样本内容推断
pub const CONTENT_INFERENCE_THRESHOLD: f64 = 0.5;
/// 样本内容推断补分上限
pub const CONTENT_INFERENCE_CAP: f64 = 0.5;
/// 全数值列 → 价格类角色
pub const NUMERIC_PRICE_BONUS: f64 = 0.2;
/// 样本含分区代码 → zone
pub const ZONE_TOKEN_BONUS: f64 = 0.3;
/// 样本含重量段写法 → weight
pub const RANGE_TOKEN_BONUS: f64 = 0.3;
/// 采纳角色的最低分
pub const MIN_ASSIGN_SCORE: f64 = 0.3;
/// 样本行数
pub const SAMPLE_ROWS: usize = 5;

// ==========================================
// 角色词表（多语种，小写子串匹配）
// ==========================================
pub fn role_keywords(role: ColumnRole) -> &'static [&'static str] {
    match role {
        ColumnRole::Zone => &["zone", "area", "region", "区域", "分区", "zona", "gebiet"],
        ColumnRole::WeightFrom => &[
            "weight from",
            "weight_from",
            "weightfrom",
            "from weight",
            "min weight",
            "minimum weight",
            "起始重量",
            "最小重量",
            "重量下限",
            "重量从",
        ],
        ColumnRole::WeightTo => &[
            "weight to",
            "weight_to",
            "weightto",
            "to weight",
            "max weight",
            "maximum weight",
            "截止重量",
            "最大重量",
            "重量上限",
            "重量至",
        ],
        ColumnRole::Weight => &["weight", "kg", "重量", "公斤", "gewicht", "poids", "peso"],
        ColumnRole::PurchasePrice => &["purchase", "cost", "buy", "采购", "成本", "进价", "底价", "einkauf"],
        ColumnRole::SalesPrice => &["sale", "sell", "retail", "售价", "销售", "零售", "verkauf"],
        ColumnRole::Price => &[
            "price", "rate", "amount", "fee", "tariff", "tarif", "charge", "价格", "运费", "费用",
            "单价", "preis",
        ],
        ColumnRole::Currency => &["currency", "curr", "币种", "货币", "währung", "devise"],
        ColumnRole::Service => &["service", "product", "服务", "产品", "渠道"],
    }
}

fn role_patterns(role: ColumnRole) -> &'static [Regex] {
    static PATTERNS: OnceLock<HashMap<ColumnRole, Vec<Regex>>> = OnceLock::new();
    let map = PATTERNS.get_or_init(|| {
        let raw: [(ColumnRole, &[&str]); 9] = [
            (
                ColumnRole::Zone,
                &[
                    r"(?i)^z\d+$",
                    r"(?i)^zone\s*(code|name|no\.?|id)?$",
                    r"^(分区|区域)(代码|编号)?$",
                ],
            ),
            (
                ColumnRole::WeightFrom,
                &[r"(?i)^\s*(from|min|von|ab)\b", r"(?i)\bfrom\b", r"^(起|从)"],
            ),
            (
                ColumnRole::WeightTo,
                &[r"(?i)^\s*(to|max|bis|up\s*to)\b", r"(?i)\bto\b", r"^(至|到|止)"],
            ),
            (
                ColumnRole::Weight,
                &[
                    r"(?i)^\s*(weight|wt|gewicht|poids|peso)\s*(\(?kgs?\)?)?\s*$",
                    r"(?i)weight\s*(range|band|bracket)",
                    r"^重量(段|区间)?(\(kg\)|（kg）)?$",
                ],
            ),
            (
                ColumnRole::PurchasePrice,
                &[
                    r"(?i)^(cost|buy|purchase)(\s*price)?$",
                    r"(?i)\b(net|purchase|buying)\s*(price|rate)\b",
                ],
            ),
            (
                ColumnRole::SalesPrice,
                &[
                    r"(?i)^(sales?|sell(ing)?)(\s*price)?$",
                    r"(?i)\b(sales?|selling|retail)\s*(price|rate)\b",
                ],
            ),
            (
                ColumnRole::Price,
                &[
                    r"(?i)^(price|rate|amount|tariff)$",
                    r"(?i)(price|rate|cost|tarif|价).*(/|per)\s*kg",
                ],
            ),
            (ColumnRole::Currency, &[r"(?i)^(ccy|cur|currency)$"]),
            (
                ColumnRole::Service,
                &[r"(?i)^(svc|service(\s*type)?|product)$"],
            ),
        ];
        raw.into_iter()
            .map(|(role, patterns)| {
                let compiled = patterns
                    .iter()
                    .filter_map(|p| Regex::new(p).ok())
                    .collect::<Vec<_>>();
                (role, compiled)
            })
            .collect()
    });
    map.get(&role).map(|v| v.as_slice()).unwrap_or(&[])
}

/// 表头是否包含角色关键词
pub fn header_has_keyword(role: ColumnRole, header: &str) -> bool {
    let lower = header.trim().to_lowercase();
    !lower.is_empty() && role_keywords(role).iter().any(|k| lower.contains(k))
}

/// 表头是否匹配角色正则
pub fn header_matches_pattern(role: ColumnRole, header: &str) -> bool {
    let trimmed = header.trim();
    !trimmed.is_empty() && role_patterns(role).iter().any(|re| re.is_match(trimmed))
}

/// 样本内容推断得分（未封顶）
pub fn content_score(role: ColumnRole, samples: &[String]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total = samples.len();
    let half = (total + 1) / 2;

    let mut score = 0.0;
    if role.is_price() && samples.iter().all(|s| is_numeric_value(s)) {
        score += NUMERIC_PRICE_BONUS;
    }
    if role == ColumnRole::Zone && samples.iter().filter(|s| is_zone_like_value(s)).count() >= half
    {
        score += ZONE_TOKEN_BONUS;
    }
    if role == ColumnRole::Weight
        && samples.iter().filter(|s| is_weight_range_value(s)).count() >= half
    {
        score += RANGE_TOKEN_BONUS;
    }
    score
}

/// 单列对单角色的打分（纯函数）
///
/// # 参数
/// - role: 语义角色
/// - header: 表头文本
/// - samples: 该列前几行的非空样本值
pub fn score_role(role: ColumnRole, header: &str, samples: &[String]) -> f64 {
    let mut score = 0.0;
    if header_has_keyword(role, header) {
        score += KEYWORD_SCORE;
    }
    if header_matches_pattern(role, header) {
        score += PATTERN_SCORE;
    }
    if score < CONTENT_INFERENCE_THRESHOLD {
        score += content_score(role, samples).min(CONTENT_INFERENCE_CAP);
    }
    score.min(1.0)
}

// ==========================================
// ColumnMapper 实现
// ==========================================
pub struct ColumnMapper;

impl ColumnMapperTrait for ColumnMapper {
    fn auto_map(&self, table: &RawTable) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();
        let mut displaced: Vec<UnmappedColumn> = Vec::new();

        for header in &table.headers {
            let samples = table.sample_column(header.index, SAMPLE_ROWS);

            // 取最高分角色（同分时按 ColumnRole::ALL 顺序靠前者优先）
            let mut best: Option<(ColumnRole, f64)> = None;
            for role in ColumnRole::ALL {
                let score = score_role(role, &header.label, &samples);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((role, score));
                }
            }

            let (role, score) = match best {
                Some(b) => b,
                None => continue,
            };
            debug!(column = header.index, header = %header.label, role = %role, score, "列评分");

            if score < MIN_ASSIGN_SCORE {
                mapping.unmapped_columns.push(UnmappedColumn {
                    column_index: header.index,
                    header: header.label.clone(),
                    best_guess: if score > 0.0 { Some(role) } else { None },
                    best_score: score,
                });
                continue;
            }

            match mapping.mappings.get(&role) {
                Some(existing) if existing.confidence >= score => {
                    // 已有更高（或同分更早）列占用该角色
                    mapping.suggestions.push(format!(
                        "列 \"{}\" 也可能是 {}（已采用列 \"{}\"）",
                        header.label, role, existing.header
                    ));
                    displaced.push(UnmappedColumn {
                        column_index: header.index,
                        header: header.label.clone(),
                        best_guess: Some(role),
                        best_score: score,
                    });
                }
                _ => {
                    let previous = mapping.mappings.insert(
                        role,
                        MappedColumn {
                            column_index: header.index,
                            header: header.label.clone(),
                            confidence: score,
                        },
                    );
                    if let Some(prev) = previous {
                        displaced.push(UnmappedColumn {
                            column_index: prev.column_index,
                            header: prev.header,
                            best_guess: Some(role),
                            best_score: prev.confidence,
                        });
                    }
                }
            }
        }

        mapping.unmapped_columns.extend(displaced);
        mapping.unmapped_columns.sort_by_key(|c| c.column_index);

        self.post_process(table, &mut mapping);
        mapping
    }

    fn validate_mapping(&self, format: SheetFormat, mapping: &ColumnMapping) -> MappingValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut missing_roles = Vec::new();

        if format != SheetFormat::List {
            return MappingValidation {
                is_valid: true,
                errors,
                warnings,
                missing_roles,
            };
        }

        if !mapping.has(ColumnRole::Zone) {
            errors.push("缺少分区列（zone）".to_string());
            missing_roles.push(ColumnRole::Zone.to_string());
        }

        let has_band = mapping.has(ColumnRole::WeightFrom) && mapping.has(ColumnRole::WeightTo);
        let has_range = mapping.has(ColumnRole::Weight);
        if !has_band && !has_range {
            if mapping.has(ColumnRole::WeightFrom) || mapping.has(ColumnRole::WeightTo) {
                errors.push("重量段不完整：需同时映射起始重量与截止重量，或映射重量区间列".to_string());
            } else {
                errors.push("缺少重量列（weightFrom/weightTo 或 weight）".to_string());
            }
            missing_roles.push(ColumnRole::Weight.to_string());
        }

        let has_price = mapping.has(ColumnRole::PurchasePrice)
            || mapping.has(ColumnRole::SalesPrice)
            || mapping.has(ColumnRole::Price);
        if !has_price {
            errors.push("缺少价格列（purchasePrice/salesPrice/price）".to_string());
            missing_roles.push(ColumnRole::Price.to_string());
        }

        if !mapping.has(ColumnRole::SalesPrice) && has_price {
            warnings.push("未映射销售价列，导入后销售价为空".to_string());
        }
        if !mapping.has(ColumnRole::Currency) {
            warnings.push("未映射币种列，将使用价卡币种".to_string());
        }

        MappingValidation {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            missing_roles,
        }
    }
}

impl ColumnMapper {
    /// 映射后处理
    ///
    /// - 只有区间重量列时提示归一化阶段需解析区间
    /// - 只有泛指价格列时默认归为采购价
    fn post_process(&self, table: &RawTable, mapping: &mut ColumnMapping) {
        if let Some(weight_col) = mapping.column(ColumnRole::Weight) {
            if !mapping.has(ColumnRole::WeightFrom) && !mapping.has(ColumnRole::WeightTo) {
                let samples = table.sample_column(weight_col, SAMPLE_ROWS);
                if samples.iter().any(|s| is_weight_range_value(s)) {
                    mapping
                        .suggestions
                        .push("重量列为区间写法（如 0-5），将在归一化阶段解析为起止重量".to_string());
                }
            }
        }

        let has_purchase = mapping.has(ColumnRole::PurchasePrice);
        let has_sales = mapping.has(ColumnRole::SalesPrice);
        if !has_purchase && !has_sales {
            if let Some(price) = mapping.mappings.remove(&ColumnRole::Price) {
                mapping.suggestions.push(format!(
                    "列 \"{}\" 未区分采购/销售，默认作为采购价",
                    price.header
                ));
                mapping.mappings.insert(ColumnRole::PurchasePrice, price);
            }
        } else if mapping.has(ColumnRole::Price) {
            mapping
                .warnings
                .push("泛指价格列与采购/销售价列并存，泛指价格列仅在采购价缺失时使用".to_string());
        }

        if !mapping.has(ColumnRole::Zone) {
            mapping.warnings.push("未识别到分区列".to_string());
        }
    }
}
