use crate::adapter::database_error::repository_error;
use crate::adapter::driven::order_repository::load_order;
use crate::adapter::driven::row_mapper::{
    to_inventory, to_reservation, INVENTORY_COLUMNS, RESERVATION_COLUMNS,
};
use crate::domain::model::{
    InventoryLogEntry, InventoryRecord, Order, OrderDraft, OrderId, OrderStatus, ProductId,
    Reservation, ReservationStatus,
};
use crate::domain::port::{RepositoryError, TransactionManager, UnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, Pool, Transaction};

/// MySQLトランザクション管理
#[derive(Clone)]
pub struct MySqlTransactionManager {
    pool: Pool<MySql>,
}

impl MySqlTransactionManager {
    /// 新しいMySQLトランザクション管理を作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionManager for MySqlTransactionManager {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| repository_error("トランザクションの開始に失敗しました", e))?;
        Ok(Box::new(MySqlUnitOfWork { tx }))
    }
}

/// sqlxのトランザクションを使った作業単位
/// 破棄されると未コミットの変更はロールバックされる
pub struct MySqlUnitOfWork {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl UnitOfWork for MySqlUnitOfWork {
    async fn find_inventory(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<InventoryRecord>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM inventories WHERE product_id = ? AND deleted_at IS NULL",
            INVENTORY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(product_id.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| repository_error("在庫の取得に失敗しました", e))?;

        row.as_ref().map(to_inventory).transpose()
    }

    async fn update_inventory_if_version(
        &mut self,
        next: &InventoryRecord,
        expected_version: i64,
    ) -> Result<bool, RepositoryError> {
        // バージョンが読み込み時から変わっていない場合のみ更新する
        let result = sqlx::query(
            r#"
            UPDATE inventories
            SET available_stock = ?, reserved_stock = ?, version = ?, updated_at = ?
            WHERE product_id = ? AND version = ? AND deleted_at IS NULL
            "#,
        )
        .bind(next.available())
        .bind(next.reserved())
        .bind(next.version())
        .bind(next.updated_at())
        .bind(next.product_id().value())
        .bind(expected_version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| repository_error("在庫の更新に失敗しました", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_available(
        &mut self,
        product_id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE inventories
            SET available_stock = available_stock + ?, version = version + 1, updated_at = ?
            WHERE product_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(quantity)
        .bind(now)
        .bind(product_id.value())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| repository_error("在庫の加算に失敗しました", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_reservations
                (product_id, order_id, quantity, status, expires_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(reservation.product_id().value())
        .bind(reservation.order_id().value())
        .bind(reservation.quantity())
        .bind(reservation.status().as_str())
        .bind(reservation.expires_at())
        .bind(reservation.created_at())
        .bind(reservation.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| repository_error("予約の登録に失敗しました", e))?;

        Ok(())
    }

    async fn find_reservation(
        &mut self,
        product_id: ProductId,
        order_id: OrderId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM inventory_reservations WHERE product_id = ? AND order_id = ?",
            RESERVATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(product_id.value())
            .bind(order_id.value())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| repository_error("予約の取得に失敗しました", e))?;

        row.as_ref().map(to_reservation).transpose()
    }

    async fn update_reservation_status(
        &mut self,
        product_id: ProductId,
        order_id: OrderId,
        from: ReservationStatus,
        to: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE inventory_reservations
            SET status = ?, updated_at = ?
            WHERE product_id = ? AND order_id = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(now)
        .bind(product_id.value())
        .bind(order_id.value())
        .bind(from.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| repository_error("予約ステータスの更新に失敗しました", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn append_inventory_log(
        &mut self,
        entry: &InventoryLogEntry,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_logs
                (product_id, order_id, change_type, quantity_change,
                 before_available, after_available, before_reserved, after_reserved,
                 reason, operator_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.product_id().value())
        .bind(entry.order_id().map(|id| id.value()))
        .bind(entry.change_type().as_str())
        .bind(entry.quantity_change())
        .bind(entry.before().available)
        .bind(entry.after().available)
        .bind(entry.before().reserved)
        .bind(entry.after().reserved)
        .bind(entry.reason())
        .bind(entry.operator_id().map(|id| id.value()))
        .bind(entry.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| repository_error("在庫ログの登録に失敗しました", e))?;

        Ok(())
    }

    async fn insert_order(&mut self, draft: &OrderDraft) -> Result<Order, RepositoryError> {
        let receiver = draft.receiver();
        let result = sqlx::query(
            r#"
            INSERT INTO orders
                (order_no, user_id, total_amount, discount_amount, shipping_fee, pay_amount,
                 status, receiver_name, receiver_phone, receiver_address, receiver_zip_code,
                 remark, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft.order_no())
        .bind(draft.user_id().value())
        .bind(draft.total_amount().amount())
        .bind(draft.discount_amount().amount())
        .bind(draft.shipping_fee().amount())
        .bind(draft.pay_amount().amount())
        .bind(OrderStatus::Pending.as_str())
        .bind(receiver.name())
        .bind(receiver.phone())
        .bind(receiver.address())
        .bind(receiver.zip_code())
        .bind(draft.remark())
        .bind(draft.created_at())
        .bind(draft.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| repository_error("注文の登録に失敗しました", e))?;

        let order_id = OrderId::new(result.last_insert_id() as i64);

        for item in draft.items() {
            sqlx::query(
                r#"
                INSERT INTO order_items
                    (order_id, product_id, product_name, product_image, quantity,
                     unit_price, total_price, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(order_id.value())
            .bind(item.product_id().value())
            .bind(item.product_name())
            .bind(item.product_image())
            .bind(item.quantity())
            .bind(item.unit_price().amount())
            .bind(item.total_price().amount())
            .bind(draft.created_at())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| repository_error("注文明細の登録に失敗しました", e))?;
        }

        Ok(draft.clone().into_order(order_id))
    }

    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        load_order(&mut *self.tx, order_id).await
    }

    async fn update_order_status(
        &mut self,
        order: &Order,
        from: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let timeline = order.timeline();
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?, paid_at = ?, shipped_at = ?, completed_at = ?, cancelled_at = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(order.status().as_str())
        .bind(timeline.paid_at)
        .bind(timeline.shipped_at)
        .bind(timeline.completed_at)
        .bind(timeline.cancelled_at)
        .bind(timeline.updated_at)
        .bind(order.id().value())
        .bind(from.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| repository_error("注文ステータスの更新に失敗しました", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx
            .commit()
            .await
            .map_err(|e| repository_error("コミットに失敗しました", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| repository_error("ロールバックに失敗しました", e))
    }
}
