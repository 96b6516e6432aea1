// ==========================================
// 尾程运价引擎 - 版式识别器实现
// ==========================================
// 职责: 判断原始表格为 matrix（分区作列头、重量段作行头）
//       或 list（每行一个 zone/weight/price 组合）
// 约定: 识别不出返回 unknown + 置信度 0，不报错
// ==========================================

use crate::domain::table::{FormatDetection, FormatHints, RawTable};
use crate::domain::types::{ColumnRole, SheetFormat};
use crate::importer::column_mapper::{header_has_keyword, header_matches_pattern};
use crate::importer::rate_importer_trait::FormatDetector as FormatDetectorTrait;
use crate::importer::value_parser::{is_weight_range_value, is_zone_like_value};
use tracing::debug;

/// 双信号命中
pub const STRONG_CONFIDENCE: f64 = 0.9;
/// 单信号命中
pub const WEAK_CONFIDENCE: f64 = 0.7;
/// 分区表头占非首列表头的最低比例
pub const ZONE_HEADER_RATIO: f64 = 2.0 / 3.0;

/// list 版式的角色族
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFamily {
    Zone,
    Weight,
    Price,
}

impl RoleFamily {
    pub const ALL: [RoleFamily; 3] = [RoleFamily::Zone, RoleFamily::Weight, RoleFamily::Price];

    fn roles(&self) -> &'static [ColumnRole] {
        match self {
            RoleFamily::Zone => &[ColumnRole::Zone],
            RoleFamily::Weight => &[ColumnRole::WeightFrom, ColumnRole::WeightTo, ColumnRole::Weight],
            RoleFamily::Price => &[
                ColumnRole::PurchasePrice,
                ColumnRole::SalesPrice,
                ColumnRole::Price,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleFamily::Zone => "zone",
            RoleFamily::Weight => "weight",
            RoleFamily::Price => "price",
        }
    }
}

/// 表头是否包含某角色族的词表关键词（大小写不敏感子串匹配）
pub fn header_matches_family(family: RoleFamily, header: &str) -> bool {
    family.roles().iter().any(|role| header_has_keyword(*role, header))
}

/// 表头单元格是否像分区名（关键词 / z\d+ / 分区代码写法）
pub fn is_zone_header(header: &str) -> bool {
    header_has_keyword(ColumnRole::Zone, header)
        || header_matches_pattern(ColumnRole::Zone, header)
        || is_zone_like_value(header)
}

pub struct FormatDetector;

impl FormatDetectorTrait for FormatDetector {
    fn detect(&self, table: &RawTable) -> FormatDetection {
        // ===== matrix 信号 =====
        let weight_signal = table
            .rows
            .first()
            .map(|row| is_weight_range_value(table.cell(row, 0)))
            .unwrap_or(false);

        let tail_headers: Vec<(usize, &str)> = table
            .headers
            .iter()
            .skip(1)
            .filter(|h| !h.raw.trim().is_empty())
            .map(|h| (h.index, h.label.as_str()))
            .collect();
        let zone_headers: Vec<usize> = tail_headers
            .iter()
            .filter(|(_, label)| is_zone_header(label))
            .map(|(idx, _)| *idx)
            .collect();
        let zone_signal = !tail_headers.is_empty()
            && zone_headers.len() as f64 >= tail_headers.len() as f64 * ZONE_HEADER_RATIO;

        // ===== list 信号 =====
        let matched_families: Vec<RoleFamily> = RoleFamily::ALL
            .into_iter()
            .filter(|family| {
                table
                    .headers
                    .iter()
                    .any(|h| header_matches_family(*family, &h.label))
            })
            .collect();

        debug!(
            weight_signal,
            zone_signal,
            zone_headers = zone_headers.len(),
            families = matched_families.len(),
            "版式信号"
        );

        let matrix_hints = || FormatHints {
            zone_header_row: Some(table.header_row_number),
            weight_column: Some(0),
            zone_columns: tail_headers.iter().map(|(idx, _)| *idx).collect(),
            matched_families: Vec::new(),
        };

        if weight_signal && zone_signal {
            return FormatDetection {
                format: SheetFormat::Matrix,
                confidence: STRONG_CONFIDENCE,
                hints: matrix_hints(),
            };
        }

        // 单信号 matrix：首格为重量段或多列分区表头，且不足以判为 list
        let single_matrix_signal = weight_signal || (zone_signal && zone_headers.len() >= 2);
        if single_matrix_signal && matched_families.len() < 2 {
            return FormatDetection {
                format: SheetFormat::Matrix,
                confidence: WEAK_CONFIDENCE,
                hints: matrix_hints(),
            };
        }

        if matched_families.len() >= 2 {
            let confidence = if matched_families.len() >= 3 {
                STRONG_CONFIDENCE
            } else {
                WEAK_CONFIDENCE
            };
            return FormatDetection {
                format: SheetFormat::List,
                confidence,
                hints: FormatHints {
                    matched_families: matched_families
                        .iter()
                        .map(|f| f.as_str().to_string())
                        .collect(),
                    ..FormatHints::default()
                },
            };
        }

        FormatDetection::unknown()
    }
}
