use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use stock_reservation_service::domain::model::{
    InventoryRecord, Money, OrderDraft, OrderId, OrderItem, OrderLine, PageRequest, Page,
    Product, ProductId, Receiver, Reservation, ReservationStatus, UserId,
};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// 在庫レコードに対する操作
#[derive(Debug, Clone)]
enum StockOp {
    Reserve(i32),
    Release(i32),
    Deduct(i32),
    Restock(i32),
    Adjust(i32),
}

fn stock_op() -> impl Strategy<Value = StockOp> {
    prop_oneof![
        (1i32..50).prop_map(StockOp::Reserve),
        (1i32..50).prop_map(StockOp::Release),
        (1i32..50).prop_map(StockOp::Deduct),
        (1i32..50).prop_map(StockOp::Restock),
        (-50i32..50).prop_map(StockOp::Adjust),
    ]
}

fn apply(record: &InventoryRecord, op: &StockOp) -> Option<InventoryRecord> {
    let result = match op {
        StockOp::Reserve(q) => record.reserve(*q, now()),
        StockOp::Release(q) => record.release(*q, now()),
        StockOp::Deduct(q) => record.deduct(*q, now()),
        StockOp::Restock(q) => record.restock(*q, now()),
        StockOp::Adjust(d) => record.adjust(*d, now()),
    };
    result.ok()
}

// 在庫レコードのプロパティベーステスト
proptest! {
    /// どのような操作列でも利用可能数と予約数は負にならない
    #[test]
    fn test_stock_counters_never_negative(
        initial in 0i32..100,
        ops in prop::collection::vec(stock_op(), 0..40),
    ) {
        let mut record = InventoryRecord::new(ProductId::new(1), initial, 0, now()).unwrap();
        for op in &ops {
            if let Some(next) = apply(&record, op) {
                record = next;
            }
            prop_assert!(record.available() >= 0);
            prop_assert!(record.reserved() >= 0);
        }
    }

    /// 成功した操作はバージョンをちょうど1つ進め、総数の変化は操作の種類で決まる
    #[test]
    fn test_successful_op_bumps_version_and_conserves_total(
        initial in 0i32..100,
        ops in prop::collection::vec(stock_op(), 1..40),
    ) {
        let mut record = InventoryRecord::new(ProductId::new(1), initial, 0, now()).unwrap();
        for op in &ops {
            let Some(next) = apply(&record, op) else { continue };
            prop_assert_eq!(next.version(), record.version() + 1);

            let expected_total = match op {
                StockOp::Reserve(_) | StockOp::Release(_) => record.total(),
                StockOp::Deduct(q) => record.total() - q,
                StockOp::Restock(q) => record.total() + q,
                StockOp::Adjust(d) => record.total() + d,
            };
            prop_assert_eq!(next.total(), expected_total);
            record = next;
        }
    }

    /// 予約してから同数を解放すると在庫数は元に戻る
    #[test]
    fn test_reserve_release_restores_counts(
        initial in 1i32..1000,
        quantity in 1i32..1000,
    ) {
        prop_assume!(quantity <= initial);
        let record = InventoryRecord::new(ProductId::new(1), initial, 0, now()).unwrap();

        let reserved = record.reserve(quantity, now()).unwrap();
        let released = reserved.release(quantity, now()).unwrap();

        prop_assert_eq!(released.available(), record.available());
        prop_assert_eq!(released.reserved(), record.reserved());
        prop_assert_eq!(released.version(), record.version() + 2);
    }

    /// 利用可能数を超える予約は常に失敗する
    #[test]
    fn test_reserve_beyond_available_fails(
        initial in 0i32..100,
        extra in 1i32..100,
    ) {
        let record = InventoryRecord::new(ProductId::new(1), initial, 0, now()).unwrap();
        prop_assert!(record.reserve(initial + extra, now()).is_err());
        prop_assert_eq!(record.has_available_stock(initial + extra), false);
    }

    /// 上限付近の入荷・調整・予約でも桁あふれせず、成功時の総数は正確に増える
    #[test]
    fn test_counters_near_i32_max_never_wrap(
        initial in (i32::MAX - 1000)..=i32::MAX,
        reserve in 0i32..1000,
        quantity in 1i32..=i32::MAX,
        delta in any::<i32>(),
    ) {
        prop_assume!(reserve <= initial);
        let mut record = InventoryRecord::new(ProductId::new(1), initial, 0, now()).unwrap();
        if reserve > 0 {
            record = record.reserve(reserve, now()).unwrap();
        }

        match record.restock(quantity, now()) {
            Ok(next) => {
                prop_assert_eq!(
                    i64::from(next.total()),
                    i64::from(record.total()) + i64::from(quantity)
                );
            }
            Err(_) => {
                prop_assert!(
                    i64::from(record.total()) + i64::from(quantity) > i64::from(i32::MAX)
                );
            }
        }

        let expected = i64::from(record.available()) + i64::from(delta);
        match record.adjust(delta, now()) {
            Ok(next) => {
                prop_assert_eq!(i64::from(next.available()), expected);
                prop_assert!(next.available() >= 0);
            }
            Err(_) => {
                prop_assert!(
                    delta == 0
                        || expected < 0
                        || expected + i64::from(record.reserved()) > i64::from(i32::MAX)
                );
            }
        }
    }

    /// 同じ商品の数量の合計が上限を超える明細はまとめられない
    #[test]
    fn test_merge_rejects_overflowing_sum(
        first in 1i32..=i32::MAX,
        second in 1i32..=i32::MAX,
    ) {
        let lines = [
            OrderLine { product_id: ProductId::new(1), quantity: first },
            OrderLine { product_id: ProductId::new(1), quantity: second },
        ];
        let merged = OrderLine::merge(&lines);
        match first.checked_add(second) {
            Some(sum) => {
                prop_assert_eq!(merged.unwrap()[0].quantity, sum);
            }
            None => {
                prop_assert!(merged.is_err());
            }
        }
    }
}

// 予約の状態遷移のプロパティベーステスト
proptest! {
    /// 終端状態からはどの状態にも遷移できない
    #[test]
    fn test_terminal_statuses_absorb(
        first in prop::sample::select(vec![
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
            ReservationStatus::Expired,
        ]),
        next in prop::sample::select(vec![
            ReservationStatus::Active,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
            ReservationStatus::Expired,
        ]),
        quantity in 1i32..10,
    ) {
        let reservation = Reservation::new(
            ProductId::new(1),
            OrderId::new(1),
            quantity,
            Duration::minutes(30),
            now(),
        )
        .unwrap();
        let settled = reservation.transition_to(first, now()).unwrap();

        prop_assert!(settled.status().is_terminal());
        prop_assert!(settled.transition_to(next, now()).is_err());
        prop_assert!(settled.ensure_settleable(quantity).is_err());
    }

    /// 期限切れの判定は有効な予約かつ期限を過ぎた場合のみ
    #[test]
    fn test_expiry_only_after_deadline(
        ttl_secs in 1i64..3600,
        elapsed_secs in 0i64..7200,
    ) {
        let reservation = Reservation::new(
            ProductId::new(1),
            OrderId::new(1),
            1,
            Duration::seconds(ttl_secs),
            now(),
        )
        .unwrap();
        let at = now() + Duration::seconds(elapsed_secs);

        prop_assert_eq!(reservation.is_expired_at(at), elapsed_secs > ttl_secs);

        let confirmed = reservation.transition_to(ReservationStatus::Confirmed, now()).unwrap();
        prop_assert!(!confirmed.is_expired_at(at));
    }
}

// 注文のプロパティベーステスト
proptest! {
    /// 同じ商品の明細をまとめても数量の合計は変わらない
    #[test]
    fn test_merge_preserves_quantities(
        lines in prop::collection::vec((1i64..5, 1i32..20), 1..20),
    ) {
        let lines: Vec<OrderLine> = lines
            .into_iter()
            .map(|(product_id, quantity)| OrderLine {
                product_id: ProductId::new(product_id),
                quantity,
            })
            .collect();

        let merged = OrderLine::merge(&lines).unwrap();

        let total_before: i32 = lines.iter().map(|l| l.quantity).sum();
        let total_after: i32 = merged.iter().map(|l| l.quantity).sum();
        prop_assert_eq!(total_before, total_after);

        let mut ids: Vec<_> = merged.iter().map(|l| l.product_id).collect();
        let count = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), count);
    }

    /// 支払金額 = 商品合計 + 送料 - 割引額
    #[test]
    fn test_pay_amount_calculation(
        prices in prop::collection::vec((1i64..10_000, 1i32..10), 1..5),
        shipping in 0i64..1_000,
        discount in 0i64..1_000,
    ) {
        let items: Vec<OrderItem> = prices
            .iter()
            .enumerate()
            .map(|(i, (price, quantity))| {
                let product = Product {
                    id: ProductId::new(i as i64 + 1),
                    name: format!("商品{}", i + 1),
                    price: Money::new(*price).unwrap(),
                    main_image: None,
                };
                OrderItem::from_product(&product, *quantity).unwrap()
            })
            .collect();
        let expected_total: i64 = prices.iter().map(|(p, q)| p * i64::from(*q)).sum();
        let receiver = Receiver::new(
            "山田太郎".to_string(),
            "090-0000-0000".to_string(),
            "東京都千代田区1-1".to_string(),
            None,
        )
        .unwrap();

        let draft = OrderDraft::new(
            UserId::new(1),
            items,
            receiver,
            Money::new(discount).unwrap(),
            Money::new(shipping).unwrap(),
            None,
            now(),
        );

        let expected_pay = expected_total + shipping - discount;
        if expected_pay >= 0 {
            let draft = draft.unwrap();
            prop_assert_eq!(draft.total_amount().amount(), expected_total);
            prop_assert_eq!(draft.pay_amount().amount(), expected_pay);
        } else {
            prop_assert!(draft.is_err());
        }
    }
}

// ページングのプロパティベーステスト
proptest! {
    /// ページサイズは常に1以上上限以下で、総ページ数は全件を覆う
    #[test]
    fn test_page_bounds(
        page in prop::option::of(0u32..1000),
        page_size in prop::option::of(0u32..1000),
        total in 0u64..10_000,
    ) {
        let request = PageRequest::new(page, page_size);
        prop_assert!(request.page() >= 1);
        prop_assert!(request.page_size() >= 1 && request.page_size() <= 100);
        prop_assert_eq!(
            request.offset(),
            u64::from(request.page() - 1) * u64::from(request.page_size())
        );

        let result: Page<()> = Page::new(Vec::new(), total, request);
        prop_assert!(result.total_pages() * u64::from(request.page_size()) >= total);
        if total > 0 {
            prop_assert!((result.total_pages() - 1) * u64::from(request.page_size()) < total);
        }
    }
}
