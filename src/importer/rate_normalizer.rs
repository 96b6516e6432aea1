// ==========================================
// 尾程运价引擎 - 运价归一化实现
// ==========================================
// 职责: 按识别出的版式把原始表格展开为候选重量段记录
// matrix: 每个 (重量段行, 分区列) 产出一条，价格记为采购价
// list:   按列映射逐行提取，缺分区/重量段/价格的行跳过
// ==========================================

use crate::domain::import::NormalizeOptions;
use crate::domain::rate::{RateTierCandidate, OPEN_ENDED_WEIGHT};
use crate::domain::table::{ColumnMapping, DataRow, FormatDetection, RawTable};
use crate::domain::types::{ColumnRole, PriceUnit, SheetFormat};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::rate_importer_trait::RateNormalizer as RateNormalizerTrait;
use crate::importer::value_parser::{
    is_open_upper_bound, is_per_kg_price, parse_price, parse_weight_range, parse_weight_value,
};
use tracing::debug;

pub struct RateNormalizer;

impl RateNormalizerTrait for RateNormalizer {
    fn normalize(
        &self,
        table: &RawTable,
        format: SheetFormat,
        detection: &FormatDetection,
        mapping: Option<&ColumnMapping>,
        options: &NormalizeOptions,
    ) -> ImportResult<Vec<RateTierCandidate>> {
        match format {
            SheetFormat::Matrix => Ok(self.normalize_matrix(table, detection, options)),
            SheetFormat::List => match mapping {
                Some(mapping) => self.normalize_list(table, mapping, options),
                None => Err(ImportError::MappingIncomplete {
                    missing: vec![
                        ColumnRole::Zone.to_string(),
                        ColumnRole::Weight.to_string(),
                        ColumnRole::Price.to_string(),
                    ],
                }),
            },
            SheetFormat::Unknown => Err(ImportError::UnknownFormat),
        }
    }
}

impl RateNormalizer {
    fn data_rows<'a>(
        &self,
        table: &'a RawTable,
        options: &'a NormalizeOptions,
    ) -> impl Iterator<Item = &'a DataRow> + 'a {
        table
            .rows
            .iter()
            .filter(move |r| options.data_start_row.map_or(true, |start| r.row_number >= start))
    }

    fn unit_for(cells: &[&str], default_unit: PriceUnit) -> PriceUnit {
        if cells.iter().any(|c| is_per_kg_price(c)) {
            PriceUnit::PerKg
        } else {
            default_unit
        }
    }

    /// matrix 版式展开
    pub fn normalize_matrix(
        &self,
        table: &RawTable,
        detection: &FormatDetection,
        options: &NormalizeOptions,
    ) -> Vec<RateTierCandidate> {
        let weight_column = detection.hints.weight_column.unwrap_or(0);
        let zone_columns: Vec<usize> = if detection.hints.zone_columns.is_empty() {
            table
                .headers
                .iter()
                .filter(|h| h.index != weight_column && !h.raw.trim().is_empty())
                .map(|h| h.index)
                .collect()
        } else {
            detection.hints.zone_columns.clone()
        };

        let mut candidates = Vec::new();
        for row in self.data_rows(table, options) {
            let band_text = table.cell(row, weight_column);
            let (from, to) = match parse_weight_range(band_text) {
                Some(band) => band,
                None => {
                    debug!(row = row.row_number, band = band_text, "重量段无法解析，跳过该行");
                    continue;
                }
            };

            for &col in &zone_columns {
                let zone_code = match table.headers.get(col) {
                    Some(h) => h.label.trim().to_string(),
                    None => continue,
                };
                let cell = table.cell(row, col).trim();
                if cell.is_empty() {
                    // 空单元格 = 该分区不提供此重量段
                    continue;
                }
                candidates.push(RateTierCandidate {
                    zone_code,
                    weight_from: Some(from),
                    weight_to: Some(to),
                    purchase_price: parse_price(cell),
                    sales_price: None,
                    price_unit: Self::unit_for(&[cell], options.price_unit),
                    currency: options.default_currency.clone(),
                    service_type: None,
                    row_number: row.row_number,
                });
            }
        }

        debug!(count = candidates.len(), zones = zone_columns.len(), "matrix 展开完成");
        candidates
    }

    /// 从显式起止列或区间列提取重量段
    fn extract_band(
        table: &RawTable,
        row: &DataRow,
        mapping: &ColumnMapping,
    ) -> Option<(f64, f64)> {
        if let (Some(from_col), Some(to_col)) = (
            mapping.column(ColumnRole::WeightFrom),
            mapping.column(ColumnRole::WeightTo),
        ) {
            let from_text = table.cell(row, from_col);
            let to_text = table.cell(row, to_col);

            if let Some(from) = parse_weight_value(from_text) {
                let to = if is_open_upper_bound(to_text) {
                    Some(OPEN_ENDED_WEIGHT.max(from))
                } else {
                    parse_weight_value(to_text)
                };
                if let Some(to) = to {
                    return Some((from, to));
                }
            }
            // 起始列写成了 "0-5" / "30+" 之类
            if to_text.trim().is_empty() {
                if let Some(band) = parse_weight_range(from_text) {
                    return Some(band);
                }
            }
        }

        mapping
            .column(ColumnRole::Weight)
            .and_then(|col| parse_weight_range(table.cell(row, col)))
    }

    fn optional_text(table: &RawTable, row: &DataRow, col: Option<usize>) -> Option<String> {
        col.map(|c| table.cell(row, c).trim())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }

    /// list 版式逐行提取
    pub fn normalize_list(
        &self,
        table: &RawTable,
        mapping: &ColumnMapping,
        options: &NormalizeOptions,
    ) -> ImportResult<Vec<RateTierCandidate>> {
        let zone_col = mapping
            .column(ColumnRole::Zone)
            .ok_or_else(|| ImportError::MappingIncomplete {
                missing: vec![ColumnRole::Zone.to_string()],
            })?;

        let purchase_col = mapping
            .column(ColumnRole::PurchasePrice)
            .or_else(|| mapping.column(ColumnRole::Price));
        let sales_col = mapping.column(ColumnRole::SalesPrice);

        let mut candidates = Vec::new();
        let mut skipped = 0usize;
        for row in self.data_rows(table, options) {
            let zone_code = table.cell(row, zone_col).trim().to_string();
            if zone_code.is_empty() {
                skipped += 1;
                continue;
            }

            let (from, to) = match Self::extract_band(table, row, mapping) {
                Some(band) => band,
                None => {
                    debug!(row = row.row_number, zone = %zone_code, "重量段缺失或无法解析，跳过该行");
                    skipped += 1;
                    continue;
                }
            };

            let purchase_text = purchase_col.map(|c| table.cell(row, c)).unwrap_or("");
            let sales_text = sales_col.map(|c| table.cell(row, c)).unwrap_or("");
            let purchase_price = parse_price(purchase_text);
            let sales_price = parse_price(sales_text);
            if purchase_price.is_none() && sales_price.is_none() {
                debug!(row = row.row_number, zone = %zone_code, "无价格，跳过该行");
                skipped += 1;
                continue;
            }

            let currency = Self::optional_text(table, row, mapping.column(ColumnRole::Currency))
                .map(|c| c.to_uppercase())
                .or_else(|| options.default_currency.clone());

            candidates.push(RateTierCandidate {
                zone_code,
                weight_from: Some(from),
                weight_to: Some(to),
                purchase_price,
                sales_price,
                price_unit: Self::unit_for(&[purchase_text, sales_text], options.price_unit),
                currency,
                service_type: Self::optional_text(table, row, mapping.column(ColumnRole::Service)),
                row_number: row.row_number,
            });
        }

        debug!(count = candidates.len(), skipped, "list 提取完成");
        Ok(candidates)
    }
}
