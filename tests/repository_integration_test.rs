// ==========================================
// Repository 层集成测试
// ==========================================
// 测试目标: 价卡事务写入、默认价卡替换、分区/运单持久化
// ==========================================

mod test_helpers;

use freight_rate_engine::logging;
use freight_rate_engine::repository::{
    RateCardRepository, RepositoryError, ShipmentCostRepository, ZoneRepository,
};
use freight_rate_engine::RateCardStatus;
use rust_decimal_macros::dec;
use test_helpers::{card_info, date, seed_card, seed_shipments, seed_zone, shipment, tier, zone, TestEnv};

#[tokio::test]
async fn test_duplicate_band_counted_as_row_failure() {
    logging::init_test();
    let env = TestEnv::new();

    let mut dup = tier("A", 0.0, 5.0, dec!(6), None);
    dup.row_number = 3;
    let summary = env
        .rate_card_repo
        .create_rate_card_with_tiers(
            &card_info(1, "C1", true),
            vec![
                tier("A", 0.0, 5.0, dec!(5), None),
                dup,
                tier("A", 5.0, 10.0, dec!(8), None),
            ],
        )
        .await
        .expect("写入价卡失败");

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.fail_count, 1);
    assert_eq!(summary.failures[0].row_number, 3);
    assert_eq!(summary.failures[0].zone_code, "A");
    assert_eq!(env.tier_count(), 2);
}

#[tokio::test]
async fn test_surcharges_persisted_with_card() {
    let env = TestEnv::new();
    let mut info = card_info(1, "C1", true);
    info.surcharges = vec![test_helpers::percentage_surcharge("FUEL", dec!(12.5))];
    let id = seed_card(&env, info, vec![tier("A", 0.0, 5.0, dec!(5), None)]).await;

    let surcharges = env.rate_card_repo.find_surcharges(id).await.unwrap();
    assert_eq!(surcharges.len(), 1);
    assert_eq!(surcharges[0].percentage, Some(dec!(12.5)));
    assert!(surcharges[0].is_mandatory);
}

#[tokio::test]
async fn test_default_flag_moves_to_latest_card() {
    let env = TestEnv::new();
    let first = seed_card(&env, card_info(1, "V1", true), vec![]).await;
    let second = seed_card(&env, card_info(1, "V2", true), vec![]).await;
    // 非默认新卡不抢默认
    let third = seed_card(&env, card_info(1, "V3", false), vec![]).await;

    let active = env
        .rate_card_repo
        .find_active_rate_card(1, date(2026, 6, 1))
        .await
        .unwrap()
        .expect("应有生效价卡");
    assert_eq!(active.rate_card_id, second);

    let cards = env.rate_card_repo.list_rate_cards(1).await.unwrap();
    let ids: Vec<i64> = cards.iter().map(|c| c.rate_card_id).collect();
    assert_eq!(ids, vec![third, second, first]);
    assert_eq!(cards.iter().filter(|c| c.is_default).count(), 1);
}

#[tokio::test]
async fn test_deactivate_rate_card() {
    let env = TestEnv::new();
    let id = seed_card(&env, card_info(1, "C1", true), vec![]).await;

    env.rate_card_repo.deactivate_rate_card(id).await.unwrap();
    let card = env.rate_card_repo.find_rate_card(id).await.unwrap().unwrap();
    assert_eq!(card.status, RateCardStatus::Inactive);
    assert!(!card.is_default);
    assert!(env
        .rate_card_repo
        .find_active_rate_card(1, date(2026, 6, 1))
        .await
        .unwrap()
        .is_none());
    assert!(env
        .rate_card_repo
        .list_active_carriers(date(2026, 6, 1))
        .await
        .unwrap()
        .is_empty());

    let missing = env.rate_card_repo.deactivate_rate_card(9999).await;
    assert!(matches!(missing, Err(RepositoryError::NotFound { .. })));
}

#[tokio::test]
async fn test_find_tiers_for_weight_includes_upper_bound() {
    let env = TestEnv::new();
    let id = seed_card(
        &env,
        card_info(1, "C1", true),
        vec![
            tier("A", 0.0, 5.0, dec!(5), None),
            tier("A", 5.0, 10.0, dec!(8), None),
            tier("B", 0.0, 5.0, dec!(9), None),
        ],
    )
    .await;

    let at_boundary = env.rate_card_repo.find_tiers_for_weight(id, "A", 5.0).await.unwrap();
    assert_eq!(at_boundary.len(), 2);
    assert_eq!(at_boundary[0].weight_to, 5.0);

    let all = env.rate_card_repo.find_tiers_by_card(id).await.unwrap();
    let zones: Vec<&str> = all.iter().map(|t| t.zone_code.as_str()).collect();
    assert_eq!(zones, vec!["A", "A", "B"]);
    assert_eq!(all[1].purchase_price, Some(dec!(8)));
}

#[tokio::test]
async fn test_zone_round_trip_and_upsert() {
    let env = TestEnv::new();
    let id = seed_zone(&env, zone(1, "FR-PARIS", 1, &["75", "92"], &["FR"])).await;

    let loaded = env.zone_repo.find_zone(1, "FR-PARIS").await.unwrap().unwrap();
    assert_eq!(loaded.zone_id, id);
    assert_eq!(loaded.postal_prefixes, vec!["75".to_string(), "92".to_string()]);
    assert!(loaded.country_codes.contains("FR"));

    // 同 (carrier, zone_code) 再次保存为更新
    let again = seed_zone(&env, zone(1, "FR-PARIS", 5, &["75"], &[])).await;
    assert_eq!(again, id);
    let zones = env.zone_repo.list_zones(1).await.unwrap();
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0].priority, 5);
    assert!(zones[0].country_codes.is_empty());
}

#[tokio::test]
async fn test_shipments_filtered_by_carrier_and_date() {
    let env = TestEnv::new();
    let inserted = seed_shipments(
        &env,
        vec![
            shipment("S1", 1, "A", date(2026, 1, 5), dec!(10), dec!(12)),
            shipment("S2", 1, "A", date(2026, 2, 10), dec!(8), dec!(11)),
            shipment("S3", 1, "B", date(2026, 3, 1), dec!(5), dec!(6)),
            shipment("S4", 2, "A", date(2026, 1, 20), dec!(7), dec!(9)),
        ],
    )
    .await;
    assert_eq!(inserted, 4);

    let records = env
        .shipment_repo
        .find_by_carrier(1, date(2026, 1, 1), date(2026, 2, 10))
        .await
        .unwrap();
    let ids: Vec<&str> = records.iter().map(|r| r.shipment_id.as_str()).collect();
    assert_eq!(ids, vec!["S1", "S2"]);
    assert_eq!(records[1].sales_amount, dec!(11));
}
