use crate::application::command::{
    AdjustStockCommand, CleanupReport, CreateInventoryCommand, DeductStockCommand,
    ReleaseStockCommand, ReserveStockCommand, RestockCommand, StockCheck, StockCheckItem,
};
use crate::application::service::{complete_unit_of_work, log_context};
use crate::application::{ApplicationError, InventorySettings};
use crate::domain::model::{
    ensure_positive_quantity, ChangeType, InventoryLogEntry, InventoryRecord, OrderId, Page,
    PageRequest, ProductId, ReleaseTarget, Reservation, ReservationStatus, StockSnapshot,
};
use crate::domain::port::{Clock, InventoryRepository, Logger, TransactionManager, UnitOfWork};
use std::sync::Arc;
use uuid::Uuid;

const COMPONENT: &str = "InventoryService";

/// 在庫サービス
///
/// 在庫の予約・解放・出庫確定・入荷・調整を楽観ロックで実行する。
/// 変更系の操作は読み込み時のバージョンを条件に書き込み、
/// 条件に一致しなければ `ConcurrentUpdate` を返す。
/// 在庫レコード・予約・監査ログの書き込みは1つの作業単位で行う。
pub struct InventoryService {
    transactions: Arc<dyn TransactionManager>,
    repository: Arc<dyn InventoryRepository>,
    clock: Arc<dyn Clock>,
    logger: Arc<dyn Logger>,
    settings: InventorySettings,
}

impl InventoryService {
    /// 新しい在庫サービスを作成
    ///
    /// # Arguments
    /// * `transactions` - トランザクション管理
    /// * `repository` - 在庫リポジトリ（参照と管理操作）
    /// * `clock` - 現在時刻
    /// * `logger` - ロガー
    /// * `settings` - 予約の有効期間などの設定
    pub fn new(
        transactions: Arc<dyn TransactionManager>,
        repository: Arc<dyn InventoryRepository>,
        clock: Arc<dyn Clock>,
        logger: Arc<dyn Logger>,
        settings: InventorySettings,
    ) -> Self {
        Self {
            transactions,
            repository,
            clock,
            logger,
            settings,
        }
    }

    /// 予約の有効期間
    pub fn reservation_ttl(&self) -> chrono::Duration {
        self.settings.reservation_ttl
    }

    pub fn settings(&self) -> &InventorySettings {
        &self.settings
    }

    /// 在庫を登録する
    ///
    /// # Returns
    /// * `Ok(InventoryRecord)` - 登録された在庫
    /// * `Err(ApplicationError::AlreadyExists)` - 同じ商品の在庫が既に存在する
    pub async fn create_inventory(
        &self,
        command: CreateInventoryCommand,
    ) -> Result<InventoryRecord, ApplicationError> {
        let record = InventoryRecord::new(
            command.product_id,
            command.initial_stock,
            command.low_stock_threshold,
            self.clock.now(),
        )?;

        if self
            .repository
            .find_by_product_id(command.product_id)
            .await?
            .is_some()
        {
            return Err(ApplicationError::AlreadyExists(format!(
                "在庫は既に存在します: 商品 {}",
                command.product_id
            )));
        }

        self.repository.create(&record).await?;
        self.logger.info(
            COMPONENT,
            "在庫を登録しました",
            None,
            Some(log_context([
                ("product_id", command.product_id.to_string()),
                ("initial_stock", command.initial_stock.to_string()),
            ])),
        );
        Ok(record)
    }

    /// 商品の在庫を取得する
    pub async fn get_inventory(
        &self,
        product_id: ProductId,
    ) -> Result<InventoryRecord, ApplicationError> {
        self.repository
            .find_by_product_id(product_id)
            .await?
            .ok_or_else(|| inventory_not_found(product_id))
    }

    /// 在庫一覧を取得する
    pub async fn list_inventories(
        &self,
        page: PageRequest,
    ) -> Result<Page<InventoryRecord>, ApplicationError> {
        Ok(self.repository.list(page).await?)
    }

    /// 在庫僅少の一覧を取得する
    pub async fn list_low_stock(
        &self,
        page: PageRequest,
    ) -> Result<Page<InventoryRecord>, ApplicationError> {
        Ok(self.repository.list_low_stock(page).await?)
    }

    /// 在庫僅少しきい値を更新する
    pub async fn update_low_stock_threshold(
        &self,
        product_id: ProductId,
        threshold: i32,
    ) -> Result<InventoryRecord, ApplicationError> {
        let current = self.get_inventory(product_id).await?;
        let updated = current.with_low_stock_threshold(threshold, self.clock.now())?;

        if !self
            .repository
            .update_low_stock_threshold(product_id, threshold, updated.updated_at())
            .await?
        {
            return Err(inventory_not_found(product_id));
        }
        Ok(updated)
    }

    /// 在庫を論理削除する
    pub async fn remove_inventory(&self, product_id: ProductId) -> Result<(), ApplicationError> {
        if !self
            .repository
            .soft_delete(product_id, self.clock.now())
            .await?
        {
            return Err(inventory_not_found(product_id));
        }
        self.logger.info(
            COMPONENT,
            "在庫を削除しました",
            None,
            Some(log_context([("product_id", product_id.to_string())])),
        );
        Ok(())
    }

    /// 商品の在庫監査ログを取得する
    pub async fn get_inventory_logs(
        &self,
        product_id: ProductId,
        page: PageRequest,
    ) -> Result<Page<InventoryLogEntry>, ApplicationError> {
        Ok(self.repository.find_logs_by_product(product_id, page).await?)
    }

    /// 注文に紐づく予約を取得する
    pub async fn get_order_reservations(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Reservation>, ApplicationError> {
        Ok(self.repository.find_reservations_by_order(order_id).await?)
    }

    /// 在庫を予約する
    pub async fn reserve_stock(
        &self,
        command: ReserveStockCommand,
    ) -> Result<InventoryRecord, ApplicationError> {
        let ttl = command.ttl.unwrap_or(self.settings.reservation_ttl);
        let mut uow = self.transactions.begin().await?;
        let result = self
            .reserve_stock_in(
                uow.as_mut(),
                command.product_id,
                command.quantity,
                command.order_id,
                ttl,
            )
            .await;
        complete_unit_of_work(uow, result, self.logger.as_ref(), COMPONENT).await
    }

    /// 呼び出し側の作業単位の中で在庫を予約する
    ///
    /// 利用可能数を減らして予約数を増やし、有効な予約と監査ログを登録する。
    ///
    /// # Returns
    /// * `Ok(InventoryRecord)` - 予約後の在庫
    /// * `Err(ApplicationError::NotFound)` - 在庫が存在しない
    /// * `Err(DomainError::InsufficientStock)` - 利用可能数が不足
    /// * `Err(ApplicationError::ConcurrentUpdate)` - 他の処理が先に在庫を更新した
    /// * `Err(ApplicationError::AlreadyExists)` - 同じ注文で既に予約済み
    pub async fn reserve_stock_in(
        &self,
        uow: &mut dyn UnitOfWork,
        product_id: ProductId,
        quantity: i32,
        order_id: OrderId,
        ttl: chrono::Duration,
    ) -> Result<InventoryRecord, ApplicationError> {
        let now = self.clock.now();
        let current = load_inventory(uow, product_id).await?;
        let next = current.reserve(quantity, now)?;
        write_guarded(uow, &current, &next).await?;

        let reservation = Reservation::new(product_id, order_id, quantity, ttl, now)?;
        uow.insert_reservation(&reservation).await?;

        let entry = InventoryLogEntry::record(ChangeType::Reserve, quantity, &current, &next, now)
            .with_order(order_id)
            .with_reason("Stock reserved for order");
        uow.append_inventory_log(&entry).await?;

        self.logger.debug(
            COMPONENT,
            "在庫を予約しました",
            None,
            Some(mutation_context(product_id, Some(order_id), quantity, &next)),
        );
        Ok(next)
    }

    /// 予約を解放する
    pub async fn release_stock(
        &self,
        command: ReleaseStockCommand,
    ) -> Result<InventoryRecord, ApplicationError> {
        let mut uow = self.transactions.begin().await?;
        let result = self
            .release_stock_in(
                uow.as_mut(),
                command.product_id,
                command.quantity,
                command.order_id,
                command.target,
            )
            .await;
        complete_unit_of_work(uow, result, self.logger.as_ref(), COMPONENT).await
    }

    /// 呼び出し側の作業単位の中で予約を解放する
    ///
    /// 予約が有効で数量が一致する場合のみ、予約数を利用可能数へ戻し、
    /// 予約を `target` のステータスへ遷移させる。
    pub async fn release_stock_in(
        &self,
        uow: &mut dyn UnitOfWork,
        product_id: ProductId,
        quantity: i32,
        order_id: OrderId,
        target: ReleaseTarget,
    ) -> Result<InventoryRecord, ApplicationError> {
        let now = self.clock.now();
        load_settleable_reservation(uow, product_id, order_id, quantity).await?;

        let current = load_inventory(uow, product_id).await?;
        let next = current.release(quantity, now)?;
        write_guarded(uow, &current, &next).await?;
        settle_reservation(uow, product_id, order_id, target.status(), now).await?;

        let entry = InventoryLogEntry::record(ChangeType::Release, -quantity, &current, &next, now)
            .with_order(order_id)
            .with_reason(target.reason());
        uow.append_inventory_log(&entry).await?;

        self.logger.debug(
            COMPONENT,
            "予約を解放しました",
            None,
            Some(mutation_context(product_id, Some(order_id), quantity, &next)),
        );
        Ok(next)
    }

    /// 予約分を出庫確定する
    pub async fn deduct_stock(
        &self,
        command: DeductStockCommand,
    ) -> Result<InventoryRecord, ApplicationError> {
        let mut uow = self.transactions.begin().await?;
        let result = self
            .deduct_stock_in(
                uow.as_mut(),
                command.product_id,
                command.quantity,
                command.order_id,
            )
            .await;
        complete_unit_of_work(uow, result, self.logger.as_ref(), COMPONENT).await
    }

    /// 呼び出し側の作業単位の中で予約分を出庫確定する
    ///
    /// 予約数のみを減らし（利用可能数は変わらない）、予約を確定状態にする。
    pub async fn deduct_stock_in(
        &self,
        uow: &mut dyn UnitOfWork,
        product_id: ProductId,
        quantity: i32,
        order_id: OrderId,
    ) -> Result<InventoryRecord, ApplicationError> {
        let now = self.clock.now();
        load_settleable_reservation(uow, product_id, order_id, quantity).await?;

        let current = load_inventory(uow, product_id).await?;
        let next = current.deduct(quantity, now)?;
        write_guarded(uow, &current, &next).await?;
        settle_reservation(
            uow,
            product_id,
            order_id,
            ReservationStatus::Confirmed,
            now,
        )
        .await?;

        let entry = InventoryLogEntry::record(ChangeType::Deduct, -quantity, &current, &next, now)
            .with_order(order_id)
            .with_reason("Stock deducted for confirmed order");
        uow.append_inventory_log(&entry).await?;

        self.logger.debug(
            COMPONENT,
            "在庫を出庫確定しました",
            None,
            Some(mutation_context(product_id, Some(order_id), quantity, &next)),
        );
        Ok(next)
    }

    /// 入荷する
    ///
    /// 利用可能数への加算はバージョン条件なしの単一の更新で行い、
    /// 監査ログには同じ作業単位で読み直した加算後の値を記録する。
    pub async fn restock(&self, command: RestockCommand) -> Result<InventoryRecord, ApplicationError> {
        ensure_positive_quantity(command.quantity)?;
        let mut uow = self.transactions.begin().await?;
        let result = self.restock_in(uow.as_mut(), &command).await;
        let record = complete_unit_of_work(uow, result, self.logger.as_ref(), COMPONENT).await?;

        self.logger.info(
            COMPONENT,
            "入荷を登録しました",
            None,
            Some(mutation_context(
                command.product_id,
                None,
                command.quantity,
                &record,
            )),
        );
        Ok(record)
    }

    async fn restock_in(
        &self,
        uow: &mut dyn UnitOfWork,
        command: &RestockCommand,
    ) -> Result<InventoryRecord, ApplicationError> {
        let now = self.clock.now();
        // 加算後の在庫数が上限に収まることを先に検証する
        load_inventory(uow, command.product_id)
            .await?
            .restock(command.quantity, now)?;
        if !uow
            .increment_available(command.product_id, command.quantity, now)
            .await?
        {
            return Err(inventory_not_found(command.product_id));
        }
        let after = load_inventory(uow, command.product_id).await?;
        let before = StockSnapshot {
            available: after.available() - command.quantity,
            reserved: after.reserved(),
        };

        let entry = InventoryLogEntry::from_snapshots(
            command.product_id,
            ChangeType::Restock,
            command.quantity,
            before,
            after.snapshot(),
            now,
        )
        .with_reason(command.reason.clone().unwrap_or_else(|| "Restock".to_string()))
        .with_operator(command.operator_id);
        uow.append_inventory_log(&entry).await?;
        Ok(after)
    }

    /// 利用可能数を差分で調整する
    ///
    /// # Returns
    /// * `Err(DomainError::InvalidAdjustment)` - 調整後の利用可能数が負になる
    pub async fn adjust_stock(
        &self,
        command: AdjustStockCommand,
    ) -> Result<InventoryRecord, ApplicationError> {
        let mut uow = self.transactions.begin().await?;
        let result = self.adjust_stock_in(uow.as_mut(), &command).await;
        let record = complete_unit_of_work(uow, result, self.logger.as_ref(), COMPONENT).await?;

        self.logger.info(
            COMPONENT,
            "在庫を調整しました",
            None,
            Some(log_context([
                ("product_id", command.product_id.to_string()),
                ("delta", command.delta.to_string()),
                ("available", record.available().to_string()),
                ("version", record.version().to_string()),
            ])),
        );
        Ok(record)
    }

    async fn adjust_stock_in(
        &self,
        uow: &mut dyn UnitOfWork,
        command: &AdjustStockCommand,
    ) -> Result<InventoryRecord, ApplicationError> {
        let now = self.clock.now();
        let current = load_inventory(uow, command.product_id).await?;
        let next = current.adjust(command.delta, now)?;
        write_guarded(uow, &current, &next).await?;

        let entry = InventoryLogEntry::record(ChangeType::Adjust, command.delta, &current, &next, now)
            .with_reason(
                command
                    .reason
                    .clone()
                    .unwrap_or_else(|| "Manual adjustment".to_string()),
            )
            .with_operator(command.operator_id);
        uow.append_inventory_log(&entry).await?;
        Ok(next)
    }

    /// 指定数量の在庫が利用可能か確認する（参照のみ）
    pub async fn check_stock_availability(
        &self,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<StockCheck, ApplicationError> {
        ensure_positive_quantity(quantity)?;
        let record = self.get_inventory(product_id).await?;
        Ok(StockCheck {
            product_id,
            available: record.available(),
            reserved: record.reserved(),
            requested: quantity,
            is_available: record.has_available_stock(quantity),
        })
    }

    /// 複数商品の在庫をまとめて確認する
    ///
    /// 結果は要求と同じ順序で返す。商品ごとに個別に読むため、
    /// 全体として一貫したスナップショットではない。
    pub async fn batch_check_stock_availability(
        &self,
        items: &[StockCheckItem],
    ) -> Result<Vec<StockCheck>, ApplicationError> {
        let mut checks = Vec::with_capacity(items.len());
        for item in items {
            checks.push(
                self.check_stock_availability(item.product_id, item.quantity)
                    .await?,
            );
        }
        Ok(checks)
    }

    /// 期限切れの予約を解放する
    ///
    /// 1件ごとに別の作業単位で解放し、失敗した予約はログに残して次回に回す。
    pub async fn cleanup_expired_reservations(&self) -> Result<CleanupReport, ApplicationError> {
        let correlation_id = Uuid::new_v4();
        let now = self.clock.now();
        let expired = self
            .repository
            .find_expired_reservations(now, self.settings.cleanup_batch_size)
            .await?;

        let mut report = CleanupReport {
            scanned: expired.len(),
            ..CleanupReport::default()
        };

        for reservation in expired {
            let command = ReleaseStockCommand {
                product_id: reservation.product_id(),
                quantity: reservation.quantity(),
                order_id: reservation.order_id(),
                target: ReleaseTarget::Expired,
            };
            match self.release_stock(command).await {
                Ok(_) => report.released += 1,
                Err(err) => {
                    report.failed += 1;
                    self.logger.warn(
                        COMPONENT,
                        "期限切れ予約の解放に失敗しました",
                        Some(correlation_id),
                        Some(log_context([
                            ("product_id", reservation.product_id().to_string()),
                            ("order_id", reservation.order_id().to_string()),
                            ("error", err.to_string()),
                        ])),
                    );
                }
            }
        }

        if report.scanned > 0 {
            self.logger.info(
                COMPONENT,
                "期限切れ予約の回収が完了しました",
                Some(correlation_id),
                Some(log_context([
                    ("scanned", report.scanned.to_string()),
                    ("released", report.released.to_string()),
                    ("failed", report.failed.to_string()),
                ])),
            );
        }
        Ok(report)
    }
}

fn inventory_not_found(product_id: ProductId) -> ApplicationError {
    ApplicationError::NotFound(format!("在庫が見つかりません: 商品 {}", product_id))
}

async fn load_inventory(
    uow: &mut dyn UnitOfWork,
    product_id: ProductId,
) -> Result<InventoryRecord, ApplicationError> {
    uow.find_inventory(product_id)
        .await?
        .ok_or_else(|| inventory_not_found(product_id))
}

/// バージョン条件付きで在庫を書き込む
async fn write_guarded(
    uow: &mut dyn UnitOfWork,
    current: &InventoryRecord,
    next: &InventoryRecord,
) -> Result<(), ApplicationError> {
    if !uow
        .update_inventory_if_version(next, current.version())
        .await?
    {
        return Err(ApplicationError::ConcurrentUpdate(format!(
            "商品 {} の在庫が同時に更新されました (バージョン {})",
            current.product_id(),
            current.version()
        )));
    }
    Ok(())
}

async fn load_settleable_reservation(
    uow: &mut dyn UnitOfWork,
    product_id: ProductId,
    order_id: OrderId,
    quantity: i32,
) -> Result<Reservation, ApplicationError> {
    let reservation = uow
        .find_reservation(product_id, order_id)
        .await?
        .ok_or_else(|| {
            ApplicationError::NotFound(format!(
                "予約が見つかりません: 商品 {}, 注文 {}",
                product_id, order_id
            ))
        })?;
    reservation.ensure_settleable(quantity)?;
    Ok(reservation)
}

async fn settle_reservation(
    uow: &mut dyn UnitOfWork,
    product_id: ProductId,
    order_id: OrderId,
    to: ReservationStatus,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(), ApplicationError> {
    if !uow
        .update_reservation_status(product_id, order_id, ReservationStatus::Active, to, now)
        .await?
    {
        return Err(ApplicationError::ConcurrentUpdate(format!(
            "商品 {} の注文 {} に対する予約が同時に更新されました",
            product_id, order_id
        )));
    }
    Ok(())
}

fn mutation_context(
    product_id: ProductId,
    order_id: Option<OrderId>,
    quantity: i32,
    record: &InventoryRecord,
) -> std::collections::HashMap<String, String> {
    let mut context = log_context([
        ("product_id", product_id.to_string()),
        ("quantity", quantity.to_string()),
        ("available", record.available().to_string()),
        ("reserved", record.reserved().to_string()),
        ("version", record.version().to_string()),
    ]);
    if let Some(order_id) = order_id {
        context.insert("order_id".to_string(), order_id.to_string());
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::driven::{InMemoryStore, ManualClock};
    use crate::domain::error::DomainError;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 警告ログを記録するテスト用ロガー
    #[derive(Default)]
    struct RecordingLogger {
        warnings: Mutex<Vec<String>>,
    }

    impl Logger for RecordingLogger {
        fn debug(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
        fn info(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
        fn warn(&self, _: &str, message: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {
            self.warnings.lock().unwrap().push(message.to_string());
        }
        fn error(&self, _: &str, _: &str, _: Option<Uuid>, _: Option<HashMap<String, String>>) {}
    }

    struct Fixture {
        store: InMemoryStore,
        clock: Arc<ManualClock>,
        logger: Arc<RecordingLogger>,
        service: InventoryService,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        ));
        let logger = Arc::new(RecordingLogger::default());
        let service = InventoryService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            clock.clone(),
            logger.clone(),
            InventorySettings::default(),
        );
        Fixture {
            store,
            clock,
            logger,
            service,
        }
    }

    async fn seed(fixture: &Fixture, product_id: i64, stock: i32) {
        fixture
            .service
            .create_inventory(CreateInventoryCommand {
                product_id: ProductId::new(product_id),
                initial_stock: stock,
                low_stock_threshold: 2,
            })
            .await
            .unwrap();
    }

    fn reserve(product_id: i64, quantity: i32, order_id: i64) -> ReserveStockCommand {
        ReserveStockCommand {
            product_id: ProductId::new(product_id),
            quantity,
            order_id: OrderId::new(order_id),
            ttl: None,
        }
    }

    #[tokio::test]
    async fn test_create_inventory_twice_fails() {
        let f = fixture();
        seed(&f, 1, 10).await;
        let result = f
            .service
            .create_inventory(CreateInventoryCommand {
                product_id: ProductId::new(1),
                initial_stock: 5,
                low_stock_threshold: 2,
            })
            .await;
        match result {
            Err(ApplicationError::AlreadyExists(msg)) => {
                assert_eq!(msg, "在庫は既に存在します: 商品 1")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reserve_writes_record_reservation_and_log() {
        let f = fixture();
        seed(&f, 1, 10).await;

        let record = f.service.reserve_stock(reserve(1, 4, 100)).await.unwrap();
        assert_eq!(record.available(), 6);
        assert_eq!(record.reserved(), 4);
        assert_eq!(record.version(), 1);

        let reservations = f
            .service
            .get_order_reservations(OrderId::new(100))
            .await
            .unwrap();
        assert_eq!(reservations.len(), 1);
        assert_eq!(reservations[0].status(), ReservationStatus::Active);
        assert_eq!(
            reservations[0].expires_at(),
            f.clock.now() + Duration::minutes(30)
        );

        let logs = f
            .service
            .get_inventory_logs(ProductId::new(1), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(logs.total, 1);
        assert_eq!(logs.items[0].change_type(), ChangeType::Reserve);
        assert_eq!(logs.items[0].quantity_change(), 4);
        assert_eq!(logs.items[0].reason(), Some("Stock reserved for order"));
    }

    #[tokio::test]
    async fn test_reserve_unknown_product_is_not_found() {
        let f = fixture();
        let result = f.service.reserve_stock(reserve(99, 1, 1)).await;
        assert!(matches!(result, Err(ApplicationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_no_trace() {
        let f = fixture();
        seed(&f, 1, 5).await;

        let result = f.service.reserve_stock(reserve(1, 6, 100)).await;
        assert!(matches!(
            result,
            Err(ApplicationError::DomainError(DomainError::InsufficientStock {
                available: 5,
                requested: 6,
                ..
            }))
        ));

        let record = f.service.get_inventory(ProductId::new(1)).await.unwrap();
        assert_eq!(record.available(), 5);
        assert_eq!(record.version(), 0);
        let logs = f
            .service
            .get_inventory_logs(ProductId::new(1), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(logs.total, 0);
    }

    #[tokio::test]
    async fn test_duplicate_reservation_rolls_back_stock() {
        let f = fixture();
        seed(&f, 1, 10).await;
        f.service.reserve_stock(reserve(1, 2, 100)).await.unwrap();

        let result = f.service.reserve_stock(reserve(1, 3, 100)).await;
        assert!(matches!(result, Err(ApplicationError::AlreadyExists(_))));

        let record = f.service.get_inventory(ProductId::new(1)).await.unwrap();
        assert_eq!(record.available(), 8);
        assert_eq!(record.reserved(), 2);
        assert_eq!(record.version(), 1);
    }

    #[tokio::test]
    async fn test_release_then_release_again_is_rejected() {
        let f = fixture();
        seed(&f, 1, 10).await;
        f.service.reserve_stock(reserve(1, 4, 100)).await.unwrap();

        let release = ReleaseStockCommand {
            product_id: ProductId::new(1),
            quantity: 4,
            order_id: OrderId::new(100),
            target: ReleaseTarget::Cancelled,
        };
        let record = f.service.release_stock(release.clone()).await.unwrap();
        assert_eq!(record.available(), 10);
        assert_eq!(record.reserved(), 0);

        let again = f.service.release_stock(release).await;
        assert!(matches!(
            again,
            Err(ApplicationError::DomainError(DomainError::InvalidStateTransition(_)))
        ));
        let record = f.service.get_inventory(ProductId::new(1)).await.unwrap();
        assert_eq!(record.available(), 10);
        assert_eq!(record.version(), 2);
    }

    #[tokio::test]
    async fn test_release_with_wrong_quantity_fails() {
        let f = fixture();
        seed(&f, 1, 10).await;
        f.service.reserve_stock(reserve(1, 4, 100)).await.unwrap();

        let result = f
            .service
            .release_stock(ReleaseStockCommand {
                product_id: ProductId::new(1),
                quantity: 3,
                order_id: OrderId::new(100),
                target: ReleaseTarget::Cancelled,
            })
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::DomainError(DomainError::InvalidValue(_)))
        ));
    }

    #[tokio::test]
    async fn test_deduct_after_cancel_is_rejected() {
        let f = fixture();
        seed(&f, 1, 10).await;
        f.service.reserve_stock(reserve(1, 4, 100)).await.unwrap();
        f.service
            .release_stock(ReleaseStockCommand {
                product_id: ProductId::new(1),
                quantity: 4,
                order_id: OrderId::new(100),
                target: ReleaseTarget::Cancelled,
            })
            .await
            .unwrap();

        let result = f
            .service
            .deduct_stock(DeductStockCommand {
                product_id: ProductId::new(1),
                quantity: 4,
                order_id: OrderId::new(100),
            })
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::DomainError(DomainError::InvalidStateTransition(_)))
        ));
    }

    #[tokio::test]
    async fn test_restock_logs_post_increment_snapshot() {
        let f = fixture();
        seed(&f, 1, 3).await;
        f.service.reserve_stock(reserve(1, 1, 100)).await.unwrap();

        let record = f
            .service
            .restock(RestockCommand {
                product_id: ProductId::new(1),
                quantity: 7,
                reason: Some("入荷".to_string()),
                operator_id: Some(crate::domain::model::OperatorId::new(5)),
            })
            .await
            .unwrap();
        assert_eq!(record.available(), 9);
        assert_eq!(record.version(), 2);

        let logs = f
            .service
            .get_inventory_logs(ProductId::new(1), PageRequest::default())
            .await
            .unwrap();
        let latest = &logs.items[0];
        assert_eq!(latest.change_type(), ChangeType::Restock);
        assert_eq!(latest.before(), StockSnapshot { available: 2, reserved: 1 });
        assert_eq!(latest.after(), StockSnapshot { available: 9, reserved: 1 });
        assert_eq!(
            latest.operator_id(),
            Some(crate::domain::model::OperatorId::new(5))
        );
    }

    #[tokio::test]
    async fn test_restock_unknown_product() {
        let f = fixture();
        let result = f
            .service
            .restock(RestockCommand {
                product_id: ProductId::new(1),
                quantity: 1,
                reason: None,
                operator_id: None,
            })
            .await;
        assert!(matches!(result, Err(ApplicationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_adjust_below_zero_is_rejected() {
        let f = fixture();
        seed(&f, 1, 3).await;
        let result = f
            .service
            .adjust_stock(AdjustStockCommand {
                product_id: ProductId::new(1),
                delta: -4,
                reason: None,
                operator_id: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::DomainError(DomainError::InvalidAdjustment { .. }))
        ));

        let record = f
            .service
            .adjust_stock(AdjustStockCommand {
                product_id: ProductId::new(1),
                delta: -3,
                reason: Some("破損".to_string()),
                operator_id: None,
            })
            .await
            .unwrap();
        assert_eq!(record.available(), 0);
    }

    #[tokio::test]
    async fn test_restock_and_adjust_beyond_i32_max_leave_stock_unchanged() {
        let f = fixture();
        seed(&f, 1, 10).await;

        let restock = f
            .service
            .restock(RestockCommand {
                product_id: ProductId::new(1),
                quantity: i32::MAX,
                reason: None,
                operator_id: None,
            })
            .await;
        let adjust = f
            .service
            .adjust_stock(AdjustStockCommand {
                product_id: ProductId::new(1),
                delta: i32::MAX,
                reason: None,
                operator_id: None,
            })
            .await;

        for result in [restock, adjust] {
            assert!(matches!(
                result,
                Err(ApplicationError::DomainError(DomainError::InvalidValue(_)))
            ));
        }
        let record = f.service.get_inventory(ProductId::new(1)).await.unwrap();
        assert_eq!(record.available(), 10);
        assert_eq!(record.version(), 0);
        assert!(f.store.is_consistent().await);
        let logs = f
            .service
            .get_inventory_logs(ProductId::new(1), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(logs.total, 0);
    }

    #[tokio::test]
    async fn test_batch_check_preserves_request_order() {
        let f = fixture();
        seed(&f, 1, 10).await;
        seed(&f, 2, 1).await;

        let checks = f
            .service
            .batch_check_stock_availability(&[
                StockCheckItem { product_id: ProductId::new(2), quantity: 2 },
                StockCheckItem { product_id: ProductId::new(1), quantity: 2 },
            ])
            .await
            .unwrap();
        assert_eq!(checks[0].product_id, ProductId::new(2));
        assert!(!checks[0].is_available);
        assert_eq!(checks[1].product_id, ProductId::new(1));
        assert!(checks[1].is_available);
        assert_eq!(checks[1].available, 10);
    }

    #[tokio::test]
    async fn test_cleanup_releases_only_expired_reservations() {
        let f = fixture();
        seed(&f, 1, 10).await;
        f.service
            .reserve_stock(ReserveStockCommand {
                ttl: Some(Duration::minutes(1)),
                ..reserve(1, 3, 100)
            })
            .await
            .unwrap();
        f.service.reserve_stock(reserve(1, 2, 101)).await.unwrap();

        f.clock.advance(Duration::minutes(5));
        let report = f.service.cleanup_expired_reservations().await.unwrap();
        assert_eq!(
            report,
            CleanupReport { scanned: 1, released: 1, failed: 0 }
        );

        let record = f.service.get_inventory(ProductId::new(1)).await.unwrap();
        assert_eq!(record.available(), 8);
        assert_eq!(record.reserved(), 2);

        let expired = f
            .service
            .get_order_reservations(OrderId::new(100))
            .await
            .unwrap();
        assert_eq!(expired[0].status(), ReservationStatus::Expired);
        assert!(f.logger.warnings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_counts_failures_and_continues() {
        let f = fixture();
        seed(&f, 1, 10).await;
        seed(&f, 2, 10).await;
        for (product, order) in [(1, 100), (2, 101)] {
            f.service
                .reserve_stock(ReserveStockCommand {
                    ttl: Some(Duration::minutes(1)),
                    ..reserve(product, 1, order)
                })
                .await
                .unwrap();
        }
        // 商品1の在庫を削除して解放を失敗させる
        f.service.remove_inventory(ProductId::new(1)).await.unwrap();

        f.clock.advance(Duration::minutes(2));
        let report = f.service.cleanup_expired_reservations().await.unwrap();
        assert_eq!(
            report,
            CleanupReport { scanned: 2, released: 1, failed: 1 }
        );
        assert_eq!(f.logger.warnings.lock().unwrap().len(), 1);
        assert!(f.store.is_consistent().await);
    }

    #[tokio::test]
    async fn test_threshold_and_low_stock_listing() {
        let f = fixture();
        seed(&f, 1, 10).await;
        seed(&f, 2, 1).await;

        let low = f.service.list_low_stock(PageRequest::default()).await.unwrap();
        assert_eq!(low.total, 1);
        assert_eq!(low.items[0].product_id(), ProductId::new(2));

        f.service
            .update_low_stock_threshold(ProductId::new(1), 10)
            .await
            .unwrap();
        let low = f.service.list_low_stock(PageRequest::default()).await.unwrap();
        assert_eq!(low.total, 2);

        let missing = f.service.update_low_stock_threshold(ProductId::new(9), 1).await;
        assert!(matches!(missing, Err(ApplicationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_removed_inventory_is_invisible() {
        let f = fixture();
        seed(&f, 1, 10).await;
        f.service.remove_inventory(ProductId::new(1)).await.unwrap();

        assert!(matches!(
            f.service.get_inventory(ProductId::new(1)).await,
            Err(ApplicationError::NotFound(_))
        ));
        assert!(matches!(
            f.service.remove_inventory(ProductId::new(1)).await,
            Err(ApplicationError::NotFound(_))
        ));
        let all = f.service.list_inventories(PageRequest::default()).await.unwrap();
        assert_eq!(all.total, 0);
    }
}
