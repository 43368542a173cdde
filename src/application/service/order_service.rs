use crate::application::command::{CreateOrderCommand, StockCheckItem};
use crate::application::service::{complete_unit_of_work, log_context, InventoryService};
use crate::application::{ApplicationError, OrderSettings};
use crate::domain::error::DomainError;
use crate::domain::model::{
    Order, OrderDraft, OrderId, OrderItem, OrderLine, OrderStatus, Page, PageRequest,
    ReleaseTarget, ReservationStatus, UserId,
};
use crate::domain::port::{Clock, Logger, OrderRepository, ProductCatalog, TransactionManager, UnitOfWork};
use std::sync::Arc;
use uuid::Uuid;

const COMPONENT: &str = "OrderService";

/// 注文サービス
///
/// 注文の作成・支払い・発送・完了・キャンセルを在庫サービスと組み合わせて実行する。
/// 各操作は注文ステータスの条件付き更新と在庫操作を1つの作業単位で行う。
pub struct OrderService {
    transactions: Arc<dyn TransactionManager>,
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn ProductCatalog>,
    inventory: Arc<InventoryService>,
    clock: Arc<dyn Clock>,
    logger: Arc<dyn Logger>,
    settings: OrderSettings,
}

impl OrderService {
    /// 新しい注文サービスを作成
    ///
    /// # Arguments
    /// * `transactions` - トランザクション管理
    /// * `orders` - 注文リポジトリ（参照）
    /// * `catalog` - 商品カタログ
    /// * `inventory` - 在庫サービス
    /// * `clock` - 現在時刻
    /// * `logger` - ロガー
    /// * `settings` - 再試行回数などの設定
    pub fn new(
        transactions: Arc<dyn TransactionManager>,
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn ProductCatalog>,
        inventory: Arc<InventoryService>,
        clock: Arc<dyn Clock>,
        logger: Arc<dyn Logger>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            transactions,
            orders,
            catalog,
            inventory,
            clock,
            logger,
            settings,
        }
    }

    /// 注文を作成する
    ///
    /// 商品情報の取得・在庫の事前確認・注文登録・在庫予約を一連の処理として実行する。
    /// 在庫の競合で失敗した場合は処理全体をやり直し、
    /// 試行のたびに `retry_backoff × 試行回数` だけ待機する。
    ///
    /// # Returns
    /// * `Ok(Order)` - 作成された注文（ステータスはPending）
    /// * `Err(ApplicationError::NotFound)` - 存在しない商品が含まれる
    /// * `Err(DomainError::InsufficientStock)` - 在庫が不足する商品がある
    /// * `Err(ApplicationError::RetriesExhausted)` - 競合が続き上限回数に達した
    pub async fn create_order(&self, command: CreateOrderCommand) -> Result<Order, ApplicationError> {
        let correlation_id = Uuid::new_v4();
        let lines = OrderLine::merge(&command.lines)?;
        let max_attempts = self.settings.max_create_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.try_create_order(&command, &lines).await {
                Ok(order) => {
                    self.logger.info(
                        COMPONENT,
                        "注文を作成しました",
                        Some(correlation_id),
                        Some(log_context([
                            ("order_id", order.id().to_string()),
                            ("order_no", order.details().order_no().to_string()),
                            ("user_id", command.user_id.to_string()),
                            ("attempt", attempt.to_string()),
                        ])),
                    );
                    return Ok(order);
                }
                Err(err) if err.is_retryable() => {
                    self.logger.warn(
                        COMPONENT,
                        "在庫の競合により注文作成を再試行します",
                        Some(correlation_id),
                        Some(log_context([
                            ("user_id", command.user_id.to_string()),
                            ("attempt", attempt.to_string()),
                            ("error", err.to_string()),
                        ])),
                    );
                    last_error = Some(err);
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            ApplicationError::ConcurrentUpdate("注文作成が一度も試行されませんでした".to_string())
        });
        self.logger.error(
            COMPONENT,
            "注文作成の再試行が上限に達しました",
            Some(correlation_id),
            Some(log_context([
                ("user_id", command.user_id.to_string()),
                ("attempts", max_attempts.to_string()),
            ])),
        );
        Err(ApplicationError::RetriesExhausted {
            attempts: max_attempts,
            last_error: Box::new(last_error),
        })
    }

    async fn try_create_order(
        &self,
        command: &CreateOrderCommand,
        lines: &[OrderLine],
    ) -> Result<Order, ApplicationError> {
        let product_ids: Vec<_> = lines.iter().map(|line| line.product_id).collect();
        let products = self.catalog.get_products_by_ids(&product_ids).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let product = products.get(&line.product_id).ok_or_else(|| {
                ApplicationError::NotFound(format!("商品が見つかりません: {}", line.product_id))
            })?;
            items.push(OrderItem::from_product(product, line.quantity)?);
        }

        let check_items: Vec<_> = lines
            .iter()
            .map(|line| StockCheckItem {
                product_id: line.product_id,
                quantity: line.quantity,
            })
            .collect();
        let checks = self
            .inventory
            .batch_check_stock_availability(&check_items)
            .await?;
        if let Some(short) = checks.iter().find(|check| !check.is_available) {
            return Err(DomainError::InsufficientStock {
                product_id: short.product_id,
                available: short.available,
                requested: short.requested,
            }
            .into());
        }

        let draft = OrderDraft::new(
            command.user_id,
            items,
            command.receiver.clone(),
            command.discount_amount,
            command.shipping_fee,
            command.remark.clone(),
            self.clock.now(),
        )?;

        let mut uow = self.transactions.begin().await?;
        let result = self.create_order_in(uow.as_mut(), &draft).await;
        complete_unit_of_work(uow, result, self.logger.as_ref(), COMPONENT).await
    }

    async fn create_order_in(
        &self,
        uow: &mut dyn UnitOfWork,
        draft: &OrderDraft,
    ) -> Result<Order, ApplicationError> {
        let order = uow.insert_order(draft).await?;
        let ttl = self.inventory.reservation_ttl();
        for item in order.items() {
            self.inventory
                .reserve_stock_in(uow, item.product_id(), item.quantity(), order.id(), ttl)
                .await?;
        }
        Ok(order)
    }

    /// 注文の支払いを確定する
    /// 予約していた在庫を出庫確定し、注文を支払い済みにする
    pub async fn pay_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, ApplicationError> {
        let mut uow = self.transactions.begin().await?;
        let result = self.pay_order_in(uow.as_mut(), user_id, order_id).await;
        let order = complete_unit_of_work(uow, result, self.logger.as_ref(), COMPONENT).await?;
        self.log_status_change(&order, "注文の支払いを確定しました");
        Ok(order)
    }

    async fn pay_order_in(
        &self,
        uow: &mut dyn UnitOfWork,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, ApplicationError> {
        let mut order = load_order(uow, order_id, Some(user_id)).await?;
        let from = order.status();
        order.pay(self.clock.now())?;

        for item in order.items() {
            self.inventory
                .deduct_stock_in(uow, item.product_id(), item.quantity(), order.id())
                .await?;
        }
        save_status(uow, &order, from).await?;
        Ok(order)
    }

    /// 注文を発送済みにする（在庫への影響なし）
    pub async fn ship_order(&self, order_id: OrderId) -> Result<Order, ApplicationError> {
        let now = self.clock.now();
        let order = self
            .change_status(order_id, |order| order.ship(now))
            .await?;
        self.log_status_change(&order, "注文を発送済みにしました");
        Ok(order)
    }

    /// 注文を完了にする（在庫への影響なし）
    pub async fn complete_order(&self, order_id: OrderId) -> Result<Order, ApplicationError> {
        let now = self.clock.now();
        let order = self
            .change_status(order_id, |order| order.complete(now))
            .await?;
        self.log_status_change(&order, "注文を完了にしました");
        Ok(order)
    }

    async fn change_status<F>(&self, order_id: OrderId, apply: F) -> Result<Order, ApplicationError>
    where
        F: FnOnce(&mut Order) -> Result<(), DomainError> + Send,
    {
        let mut uow = self.transactions.begin().await?;
        let result = async {
            let mut order = load_order(uow.as_mut(), order_id, None).await?;
            let from = order.status();
            apply(&mut order)?;
            save_status(uow.as_mut(), &order, from).await?;
            Ok::<_, ApplicationError>(order)
        }
        .await;
        complete_unit_of_work(uow, result, self.logger.as_ref(), COMPONENT).await
    }

    /// 注文をキャンセルする
    ///
    /// 支払い前の注文のみキャンセルでき、有効な予約を解放する。
    /// 既に期限切れで解放済みの予約は対象外とする。
    pub async fn cancel_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, ApplicationError> {
        let mut uow = self.transactions.begin().await?;
        let result = self.cancel_order_in(uow.as_mut(), user_id, order_id).await;
        let order = complete_unit_of_work(uow, result, self.logger.as_ref(), COMPONENT).await?;
        self.log_status_change(&order, "注文をキャンセルしました");
        Ok(order)
    }

    async fn cancel_order_in(
        &self,
        uow: &mut dyn UnitOfWork,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, ApplicationError> {
        let mut order = load_order(uow, order_id, Some(user_id)).await?;
        let from = order.status();
        order.cancel(self.clock.now())?;

        for item in order.items() {
            let reservation = uow.find_reservation(item.product_id(), order.id()).await?;
            if matches!(reservation, Some(ref r) if r.status() == ReservationStatus::Expired) {
                self.logger.debug(
                    COMPONENT,
                    "期限切れで解放済みの予約をスキップしました",
                    None,
                    Some(log_context([
                        ("order_id", order.id().to_string()),
                        ("product_id", item.product_id().to_string()),
                    ])),
                );
                continue;
            }
            self.inventory
                .release_stock_in(
                    uow,
                    item.product_id(),
                    item.quantity(),
                    order.id(),
                    ReleaseTarget::Cancelled,
                )
                .await?;
        }
        save_status(uow, &order, from).await?;
        Ok(order)
    }

    /// 利用者の注文を取得する
    /// 他の利用者の注文は存在しないものとして扱う
    pub async fn get_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, ApplicationError> {
        self.orders
            .find_by_id(order_id)
            .await?
            .filter(|order| order.is_owned_by(user_id))
            .ok_or_else(|| order_not_found(order_id))
    }

    /// 注文番号で利用者の注文を取得する
    /// 他の利用者の注文は存在しないものとして扱う
    pub async fn get_order_by_order_no(
        &self,
        user_id: UserId,
        order_no: &str,
    ) -> Result<Order, ApplicationError> {
        self.orders
            .find_by_order_no(order_no)
            .await?
            .filter(|order| order.is_owned_by(user_id))
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("注文が見つかりません: 注文番号 {}", order_no))
            })
    }

    /// 利用者の注文一覧を取得する
    pub async fn list_user_orders(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>, ApplicationError> {
        Ok(self.orders.find_by_user(user_id, page).await?)
    }

    fn log_status_change(&self, order: &Order, message: &str) {
        self.logger.info(
            COMPONENT,
            message,
            None,
            Some(log_context([
                ("order_id", order.id().to_string()),
                ("status", order.status().to_string()),
            ])),
        );
    }
}

fn order_not_found(order_id: OrderId) -> ApplicationError {
    ApplicationError::NotFound(format!("注文が見つかりません: {}", order_id))
}

async fn load_order(
    uow: &mut dyn UnitOfWork,
    order_id: OrderId,
    owner: Option<UserId>,
) -> Result<Order, ApplicationError> {
    let order = uow
        .find_order(order_id)
        .await?
        .ok_or_else(|| order_not_found(order_id))?;
    match owner {
        Some(user_id) if !order.is_owned_by(user_id) => Err(order_not_found(order_id)),
        _ => Ok(order),
    }
}

/// 注文ステータスを条件付きで保存する
async fn save_status(
    uow: &mut dyn UnitOfWork,
    order: &Order,
    from: OrderStatus,
) -> Result<(), ApplicationError> {
    if !uow.update_order_status(order, from).await? {
        return Err(ApplicationError::ConcurrentUpdate(format!(
            "注文 {} は既に {} ではありません",
            order.id(),
            from
        )));
    }
    Ok(())
}
