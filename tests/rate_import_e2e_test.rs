// ==========================================
// 价卡导入端到端测试
// ==========================================
// 测试目标: 上传 → 解析 → 预览 → 确认 → 计价 全链路
// ==========================================

mod test_helpers;

use freight_rate_engine::domain::import::ImportOptions;
use freight_rate_engine::domain::quote::QuoteRequest;
use freight_rate_engine::domain::types::{SheetFormat, ValidationStatus};
use freight_rate_engine::importer::{ImportError, RateImporter};
use freight_rate_engine::logging;
use freight_rate_engine::repository::RateCardRepository;
use rust_decimal_macros::dec;
use test_helpers::{card_info, date, TestEnv};

#[tokio::test]
async fn test_list_sheet_import_then_quote() {
    logging::init_test();
    let env = TestEnv::new();
    let importer = env.importer().await;

    let csv = "Zone,Weight From,Weight To,Purchase,Sales\n\
               A,0,5,5.00,7.00\n\
               A,5,10,8.00,11.00\n";
    let parsed = importer
        .parse_file(csv.as_bytes().to_vec(), "carrier_list.csv")
        .await
        .unwrap();
    assert_eq!(parsed.format_detection.format, SheetFormat::List);

    let preview = importer
        .preview_import(&parsed, None, &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(preview.validation.records.valid.len(), 2);
    assert!(preview.validation.duplicates.is_empty());
    assert!(preview.validation.continuity.gaps.is_empty());
    assert_eq!(preview.validation.status, ValidationStatus::Success);

    let summary = importer
        .confirm_preview(&preview.preview_id, card_info(1, "LIST", true), &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.fail_count, 0);

    let engine = env.pricing_engine();
    let result = engine
        .calculate_freight(&QuoteRequest {
            carrier_id: 1,
            zone_code: Some("A".to_string()),
            weight_kg: 7.0,
            pricing_date: Some(date(2026, 3, 1)),
            ..QuoteRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(result.total_purchase, dec!(8.00));
    assert_eq!(result.total_sales, dec!(11.00));
    assert_eq!(result.profit, dec!(3.00));
    assert!(!result.matched_tier.is_overflow);
}

#[tokio::test]
async fn test_matrix_sheet_import_produces_tiers_per_zone_and_band() {
    let env = TestEnv::new();
    let importer = env.importer().await;

    let csv = ",Zone1,Zone2\n0-5,5.00,6.00\n5-10,8.00,9.50\n";
    let parsed = importer
        .parse_file(csv.as_bytes().to_vec(), "carrier_matrix.csv")
        .await
        .unwrap();
    assert_eq!(parsed.format_detection.format, SheetFormat::Matrix);
    assert!(parsed.format_detection.confidence >= 0.9);

    let preview = importer
        .preview_by_parse_id(&parsed.parse_id, None, &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(preview.rates.len(), 4);
    assert!(preview.rates.iter().all(|r| r.purchase_price.is_some()));
    assert!(preview.rates.iter().all(|r| r.sales_price.is_none()));

    let summary = importer
        .confirm_preview(&preview.preview_id, card_info(2, "MATRIX", true), &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.success_count, 4);

    let tiers = env
        .rate_card_repo
        .find_tiers(summary.rate_card_id, "Zone2")
        .await
        .unwrap();
    assert_eq!(tiers.len(), 2);
    assert_eq!(tiers[1].purchase_price, Some(dec!(9.50)));
}

#[tokio::test]
async fn test_gap_and_overlap_are_warnings_not_errors() {
    let env = TestEnv::new();
    let importer = env.importer().await;

    let csv = "Zone,Weight From,Weight To,Purchase\n\
               A,0,5,5\n\
               A,7,10,8\n\
               B,0,5,5\n\
               B,3,8,6\n";
    let parsed = importer.parse_file(csv.as_bytes().to_vec(), "bands.csv").await.unwrap();
    let preview = importer
        .preview_import(&parsed, None, &ImportOptions::default())
        .await
        .unwrap();

    assert!(preview.validation.can_proceed);
    assert_eq!(preview.validation.status, ValidationStatus::Warning);
    let gap = &preview.validation.continuity.gaps[0];
    assert_eq!((gap.zone_code.as_str(), gap.from, gap.to), ("A", 5.0, 7.0));
    assert_eq!(preview.validation.continuity.overlaps[0].zone_code, "B");
}

#[tokio::test]
async fn test_row_errors_isolated_to_row() {
    let env = TestEnv::new();
    let importer = env.importer().await;

    let csv = "Zone,Weight From,Weight To,Purchase,Sales\n\
               A,0,5,5,7\n\
               A,5,10,,9\n\
               A,10,20,-3,4\n";
    let parsed = importer.parse_file(csv.as_bytes().to_vec(), "rows.csv").await.unwrap();
    let preview = importer
        .preview_import(&parsed, None, &ImportOptions::default())
        .await
        .unwrap();

    assert_eq!(preview.validation.records.valid.len(), 1);
    assert_eq!(preview.validation.records.invalid.len(), 2);
    assert!(!preview.validation.can_proceed);

    // 仅写入有效记录，无效行计入失败
    let summary = importer
        .confirm_preview(&preview.preview_id, card_info(3, "ROWS", true), &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.fail_count, 2);
}

#[tokio::test]
async fn test_expired_or_unknown_preview_is_rejected() {
    let env = TestEnv::new();
    let importer = env.importer().await;
    let result = importer
        .confirm_preview("no-such-preview", card_info(1, "X", true), &ImportOptions::default())
        .await;
    assert!(matches!(result, Err(ImportError::PreviewExpired(_))));
}
