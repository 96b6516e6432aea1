// ==========================================
// 尾程运价引擎 - 运价校验器实现
// ==========================================
// 职责: 候选记录的字段/范围校验、合理性检查、重复段检查、连续性检查
// 约定: 结构性问题（重复/断档/重叠）一律为警告，只报告不修正
// ==========================================

use crate::domain::import::{
    BandIssue, ContinuityReport, DuplicateTier, FullValidation, RecordValidation, RowIssue,
    ValidationOptions,
};
use crate::domain::rate::{RateTierCandidate, OPEN_ENDED_WEIGHT};
use crate::domain::types::{IssueLevel, ValidationStatus};
use crate::importer::rate_importer_trait::RateValidator as RateValidatorTrait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// 重量比较容差
const WEIGHT_EPSILON: f64 = 1e-9;

fn issue(row: usize, field: &str, level: IssueLevel, message: String) -> RowIssue {
    RowIssue {
        row_number: row,
        field: field.to_string(),
        level,
        message,
    }
}

pub struct RateValidator;

impl RateValidatorTrait for RateValidator {
    fn validate(
        &self,
        records: &[RateTierCandidate],
        options: &ValidationOptions,
    ) -> FullValidation {
        let record_validation = self.validate_records(records, options);
        let duplicates = self.find_duplicates(records);
        let continuity = self.check_continuity(&record_validation.valid);

        let can_proceed = record_validation.errors.is_empty();
        let status = if !can_proceed {
            ValidationStatus::Error
        } else if !record_validation.warnings.is_empty()
            || !duplicates.is_empty()
            || !continuity.is_continuous()
        {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Success
        };

        debug!(
            valid = record_validation.valid.len(),
            invalid = record_validation.invalid.len(),
            duplicates = duplicates.len(),
            gaps = continuity.gaps.len(),
            overlaps = continuity.overlaps.len(),
            status = %status,
            "校验完成"
        );

        FullValidation {
            can_proceed,
            status,
            records: record_validation,
            duplicates,
            continuity,
        }
    }
}

impl RateValidator {
    /// 单条记录的错误与警告
    pub fn check_record(
        &self,
        record: &RateTierCandidate,
        options: &ValidationOptions,
    ) -> (Vec<RowIssue>, Vec<RowIssue>) {
        let row = record.row_number;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // ===== 字段/范围检查（错误）=====
        if record.zone_code.trim().is_empty() {
            errors.push(issue(row, "zone", IssueLevel::Error, "分区为空".to_string()));
        }

        match record.weight_from {
            None => errors.push(issue(row, "weightFrom", IssueLevel::Error, "起始重量缺失".to_string())),
            Some(from) if !from.is_finite() || from < options.min_weight => errors.push(issue(
                row,
                "weightFrom",
                IssueLevel::Error,
                format!("起始重量 {} 小于下限 {}", from, options.min_weight),
            )),
            Some(_) => {}
        }

        match record.weight_to {
            None => errors.push(issue(row, "weightTo", IssueLevel::Error, "截止重量缺失".to_string())),
            Some(to) if !to.is_finite() => errors.push(issue(
                row,
                "weightTo",
                IssueLevel::Error,
                format!("截止重量 {} 非法", to),
            )),
            Some(to) => {
                if let Some(from) = record.weight_from {
                    if to < from {
                        errors.push(issue(
                            row,
                            "weightTo",
                            IssueLevel::Error,
                            format!("截止重量 {} 小于起始重量 {}", to, from),
                        ));
                    }
                }
                if to > options.max_weight && to < OPEN_ENDED_WEIGHT {
                    warnings.push(issue(
                        row,
                        "weightTo",
                        IssueLevel::Warning,
                        format!("截止重量 {} 超过上限 {}", to, options.max_weight),
                    ));
                }
            }
        }

        if options.require_purchase_price && record.purchase_price.is_none() {
            errors.push(issue(row, "purchasePrice", IssueLevel::Error, "采购价缺失".to_string()));
        }
        if options.require_sales_price && record.sales_price.is_none() {
            errors.push(issue(row, "salesPrice", IssueLevel::Error, "销售价缺失".to_string()));
        }

        for (field, price) in [
            ("purchasePrice", record.purchase_price),
            ("salesPrice", record.sales_price),
        ] {
            let Some(price) = price else { continue };
            if price < Decimal::ZERO && !options.allow_negative_price {
                errors.push(issue(row, field, IssueLevel::Error, format!("价格为负数: {}", price)));
            }
            // ===== 合理性检查（警告）=====
            if price > options.max_price {
                warnings.push(issue(
                    row,
                    field,
                    IssueLevel::Warning,
                    format!("价格 {} 超过上限 {}", price, options.max_price),
                ));
            }
        }

        if let (Some(purchase), Some(sales)) = (record.purchase_price, record.sales_price) {
            if sales < purchase {
                warnings.push(issue(
                    row,
                    "salesPrice",
                    IssueLevel::Warning,
                    format!("销售价 {} 低于采购价 {}，将产生亏损", sales, purchase),
                ));
            }
        }

        (errors, warnings)
    }

    /// 字段/范围 + 合理性检查，拆分有效/无效记录
    pub fn validate_records(
        &self,
        records: &[RateTierCandidate],
        options: &ValidationOptions,
    ) -> RecordValidation {
        let mut result = RecordValidation::default();
        for record in records {
            let (errors, warnings) = self.check_record(record, options);
            if errors.is_empty() {
                result.valid.push(record.clone());
            } else {
                result.invalid.push(record.clone());
            }
            result.errors.extend(errors);
            result.warnings.extend(warnings);
        }
        result
    }

    /// 重复重量段检查（与输入顺序无关）
    pub fn find_duplicates(&self, records: &[RateTierCandidate]) -> Vec<DuplicateTier> {
        let mut groups: HashMap<(String, u64, u64), Vec<usize>> = HashMap::new();
        for record in records {
            if let Some((zone, from, to)) = record.band_key() {
                groups
                    .entry((zone, from.to_bits(), to.to_bits()))
                    .or_default()
                    .push(record.row_number);
            }
        }

        let mut duplicates: Vec<DuplicateTier> = groups
            .into_iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|((zone_code, from, to), mut row_numbers)| {
                row_numbers.sort_unstable();
                DuplicateTier {
                    zone_code,
                    weight_from: f64::from_bits(from),
                    weight_to: f64::from_bits(to),
                    row_numbers,
                }
            })
            .collect();
        duplicates.sort_by(|a, b| {
            a.zone_code
                .cmp(&b.zone_code)
                .then(a.weight_from.total_cmp(&b.weight_from))
                .then(a.weight_to.total_cmp(&b.weight_to))
        });
        duplicates
    }

    /// 按分区检查重量段断档与重叠
    ///
    /// 相同重量段由重复检查负责，这里只比较不同的段
    pub fn check_continuity(&self, records: &[RateTierCandidate]) -> ContinuityReport {
        let mut by_zone: BTreeMap<String, Vec<(f64, f64, usize)>> = BTreeMap::new();
        for record in records {
            if let Some((zone, from, to)) = record.band_key() {
                by_zone.entry(zone).or_default().push((from, to, record.row_number));
            }
        }

        let mut report = ContinuityReport::default();
        for (zone, mut bands) in by_zone {
            bands.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
            bands.dedup_by(|b, a| (a.0 - b.0).abs() < WEIGHT_EPSILON && (a.1 - b.1).abs() < WEIGHT_EPSILON);

            let mut iter = bands.into_iter();
            let Some((_, mut covered_to, mut covered_row)) = iter.next() else {
                continue;
            };
            for (from, to, row) in iter {
                if from > covered_to + WEIGHT_EPSILON {
                    report.gaps.push(BandIssue {
                        zone_code: zone.clone(),
                        from: covered_to,
                        to: from,
                        row_numbers: vec![covered_row, row],
                    });
                } else if from < covered_to - WEIGHT_EPSILON {
                    report.overlaps.push(BandIssue {
                        zone_code: zone.clone(),
                        from,
                        to: covered_to.min(to),
                        row_numbers: vec![covered_row, row],
                    });
                }
                if to > covered_to {
                    covered_to = to;
                    covered_row = row;
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PriceUnit;
    use rust_decimal_macros::dec;

    fn candidate(row: usize, zone: &str, from: f64, to: f64) -> RateTierCandidate {
        RateTierCandidate {
            zone_code: zone.to_string(),
            weight_from: Some(from),
            weight_to: Some(to),
            purchase_price: Some(dec!(5)),
            sales_price: Some(dec!(7)),
            price_unit: PriceUnit::PerShipment,
            currency: None,
            service_type: None,
            row_number: row,
        }
    }

    #[test]
    fn test_field_checks_produce_errors() {
        let mut missing_zone = candidate(2, " ", 0.0, 5.0);
        missing_zone.purchase_price = None;
        let inverted = candidate(3, "A", 10.0, 5.0);
        let mut negative = candidate(4, "A", 0.0, 5.0);
        negative.purchase_price = Some(dec!(-1));

        let v = RateValidator.validate_records(
            &[missing_zone, inverted, negative],
            &ValidationOptions::default(),
        );
        assert!(v.valid.is_empty());
        assert_eq!(v.invalid.len(), 3);
        let fields: Vec<(usize, &str)> = v.errors.iter().map(|e| (e.row_number, e.field.as_str())).collect();
        assert!(fields.contains(&(2, "zone")));
        assert!(fields.contains(&(2, "purchasePrice")));
        assert!(fields.contains(&(3, "weightTo")));
        assert!(fields.contains(&(4, "purchasePrice")));
    }

    #[test]
    fn test_negative_price_allowed_by_option() {
        let mut negative = candidate(2, "A", 0.0, 5.0);
        negative.purchase_price = Some(dec!(-1));
        let options = ValidationOptions {
            allow_negative_price: true,
            ..ValidationOptions::default()
        };
        let v = RateValidator.validate_records(&[negative], &options);
        assert_eq!(v.valid.len(), 1);
    }

    #[test]
    fn test_sanity_checks_are_warnings() {
        let mut loss = candidate(2, "A", 0.0, 5.0);
        loss.sales_price = Some(dec!(4));
        let heavy = candidate(3, "A", 5.0, 2000.0);
        let open = candidate(4, "A", 2000.0, OPEN_ENDED_WEIGHT);
        let mut pricey = candidate(5, "B", 0.0, 5.0);
        pricey.purchase_price = Some(dec!(200000));
        pricey.sales_price = Some(dec!(250000));

        let v = RateValidator.validate_records(&[loss, heavy, open, pricey], &ValidationOptions::default());
        assert_eq!(v.valid.len(), 4);
        assert!(v.errors.is_empty());
        let rows: Vec<usize> = v.warnings.iter().map(|w| w.row_number).collect();
        assert!(rows.contains(&2));
        assert!(rows.contains(&3));
        assert!(!rows.contains(&4));
        assert_eq!(rows.iter().filter(|r| **r == 5).count(), 2);
    }

    #[test]
    fn test_duplicates_symmetric_regardless_of_order() {
        let a = candidate(7, "A", 0.0, 5.0);
        let b = candidate(3, "A", 0.0, 5.0);
        let c = candidate(4, "A", 5.0, 10.0);

        let forward = RateValidator.find_duplicates(&[a.clone(), b.clone(), c.clone()]);
        let backward = RateValidator.find_duplicates(&[c, b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].row_numbers, vec![3, 7]);
    }

    #[test]
    fn test_continuity_adjacent_bands_no_gap() {
        let report = RateValidator.check_continuity(&[
            candidate(2, "A", 0.0, 5.0),
            candidate(3, "A", 5.0, 10.0),
        ]);
        assert!(report.is_continuous());
    }

    #[test]
    fn test_continuity_gap_reported() {
        let report = RateValidator.check_continuity(&[
            candidate(3, "A", 7.0, 10.0),
            candidate(2, "A", 0.0, 5.0),
        ]);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].from, 5.0);
        assert_eq!(report.gaps[0].to, 7.0);
        assert!(report.overlaps.is_empty());
    }

    #[test]
    fn test_continuity_overlap_reported() {
        let report = RateValidator.check_continuity(&[
            candidate(2, "A", 0.0, 5.0),
            candidate(3, "A", 3.0, 8.0),
        ]);
        assert_eq!(report.overlaps.len(), 1);
        assert_eq!(report.overlaps[0].from, 3.0);
        assert_eq!(report.overlaps[0].to, 5.0);
        assert!(report.gaps.is_empty());
    }

    #[test]
    fn test_continuity_is_per_zone() {
        let report = RateValidator.check_continuity(&[
            candidate(2, "A", 0.0, 5.0),
            candidate(3, "B", 7.0, 10.0),
        ]);
        assert!(report.is_continuous());
    }

    #[test]
    fn test_full_validation_status() {
        let clean = RateValidator.validate(
            &[candidate(2, "A", 0.0, 5.0), candidate(3, "A", 5.0, 10.0)],
            &ValidationOptions::default(),
        );
        assert!(clean.can_proceed);
        assert_eq!(clean.status, ValidationStatus::Success);

        let with_dupes = RateValidator.validate(
            &[candidate(2, "A", 0.0, 5.0), candidate(3, "A", 0.0, 5.0)],
            &ValidationOptions::default(),
        );
        assert!(with_dupes.can_proceed);
        assert_eq!(with_dupes.status, ValidationStatus::Warning);

        let broken = RateValidator.validate(
            &[candidate(2, "A", 0.0, 5.0), candidate(3, "", 5.0, 10.0)],
            &ValidationOptions::default(),
        );
        assert!(!broken.can_proceed);
        assert_eq!(broken.status, ValidationStatus::Error);
    }

    #[test]
    fn test_empty_batch_has_no_field_errors() {
        // 空批次由确认写入阶段拒绝（NoValidRecords），校验本身不报错
        let empty = RateValidator.validate(&[], &ValidationOptions::default());
        assert!(empty.can_proceed);
        assert_eq!(empty.status, ValidationStatus::Success);
    }
}
