// ==========================================
// 利润分析集成测试
// ==========================================
// 测试目标: 价卡毛利分布、运单利润按分区/按月汇总
// ==========================================

mod test_helpers;

use rust_decimal_macros::dec;
use test_helpers::{card_info, date, seed_card, seed_shipments, shipment, tier, TestEnv};

#[tokio::test]
async fn test_tier_margin_report_per_zone() {
    let env = TestEnv::new();
    let id = seed_card(
        &env,
        card_info(1, "C1", true),
        vec![
            tier("A", 0.0, 5.0, dec!(10), Some(dec!(15))),
            tier("A", 5.0, 10.0, dec!(20), Some(dec!(22))),
            // 仅采购价，不参与毛利统计
            tier("B", 0.0, 5.0, dec!(8), None),
        ],
    )
    .await;

    let report = env.profit_analyzer().tier_margin_report(id).await.unwrap();
    assert!(!report.insufficient);
    assert_eq!(report.priced_tier_count, 2);

    let a = &report.zones[0];
    assert_eq!(a.zone_code, "A");
    assert_eq!(a.min_margin_rate, Some(dec!(10)));
    assert_eq!(a.max_margin_rate, Some(dec!(50)));
    assert_eq!(a.avg_margin_rate, Some(dec!(30)));

    let b = &report.zones[1];
    assert_eq!(b.tier_count, 1);
    assert_eq!(b.priced_tier_count, 0);
    assert!(b.avg_margin_rate.is_none());
}

#[tokio::test]
async fn test_tier_margin_report_insufficient_without_sales_prices() {
    let env = TestEnv::new();
    let id = seed_card(&env, card_info(1, "C1", true), vec![tier("A", 0.0, 5.0, dec!(8), None)]).await;

    let report = env
        .profit_analyzer()
        .with_min_priced_tiers(2)
        .tier_margin_report(id)
        .await
        .unwrap();
    assert!(report.insufficient);
    assert!(report.message.is_some());
}

#[tokio::test]
async fn test_shipment_profit_grouped_by_zone_and_month() {
    let env = TestEnv::new();
    seed_shipments(
        &env,
        vec![
            shipment("S1", 1, "A", date(2026, 1, 5), dec!(10), dec!(12)),
            shipment("S2", 1, "A", date(2026, 2, 10), dec!(8), dec!(11)),
            shipment("S3", 1, "B", date(2026, 2, 20), dec!(5), dec!(6)),
        ],
    )
    .await;

    let report = env
        .profit_analyzer()
        .shipment_profit_report(1, date(2026, 1, 1), date(2026, 2, 28))
        .await
        .unwrap();
    assert!(!report.insufficient);
    assert_eq!(report.total.shipment_count, 3);
    assert_eq!(report.total.total_profit, dec!(6));

    let months: Vec<&str> = report.by_month.iter().map(|b| b.key.as_str()).collect();
    assert_eq!(months, vec!["2026-01", "2026-02"]);
    assert_eq!(report.by_zone[0].key, "A");
    assert_eq!(report.by_zone[0].total_profit, dec!(5));

    let empty = env
        .profit_analyzer()
        .shipment_profit_report(1, date(2025, 1, 1), date(2025, 12, 31))
        .await
        .unwrap();
    assert!(empty.insufficient);
}
