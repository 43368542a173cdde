use crate::adapter::database_error::repository_error;
use crate::adapter::driven::row_mapper::{
    to_inventory, to_inventory_log, to_reservation, INVENTORY_COLUMNS, RESERVATION_COLUMNS,
};
use crate::domain::model::{
    InventoryLogEntry, InventoryRecord, OrderId, Page, PageRequest, ProductId, Reservation,
    ReservationStatus,
};
use crate::domain::port::{InventoryRepository, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, Pool};

/// MySQL在庫リポジトリ
/// トランザクション外で行う在庫の参照と管理操作を担当する
#[derive(Clone)]
pub struct MySqlInventoryRepository {
    pool: Pool<MySql>,
}

impl MySqlInventoryRepository {
    /// 新しいMySQL在庫リポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    ///
    /// # Returns
    /// * MySqlInventoryRepositoryのインスタンス
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str, operation: &str) -> Result<u64, RepositoryError> {
        let total: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| repository_error(operation, e))?;
        Ok(total.max(0) as u64)
    }

    async fn fetch_page(
        &self,
        filter: &str,
        order_by: &str,
        page: PageRequest,
    ) -> Result<Page<InventoryRecord>, RepositoryError> {
        let total = self
            .count(
                &format!("SELECT COUNT(*) FROM inventories WHERE {}", filter),
                "在庫件数の取得に失敗しました",
            )
            .await?;

        let sql = format!(
            "SELECT {} FROM inventories WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            INVENTORY_COLUMNS, filter, order_by
        );
        let rows = sqlx::query(&sql)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| repository_error("在庫一覧の取得に失敗しました", e))?;

        let records = rows
            .iter()
            .map(to_inventory)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(records, total, page))
    }
}

#[async_trait]
impl InventoryRepository for MySqlInventoryRepository {
    async fn create(&self, record: &InventoryRecord) -> Result<(), RepositoryError> {
        // 論理削除済みの行も一意制約の対象になる
        sqlx::query(
            r#"
            INSERT INTO inventories
                (product_id, available_stock, reserved_stock, low_stock_threshold, version,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.product_id().value())
        .bind(record.available())
        .bind(record.reserved())
        .bind(record.low_stock_threshold())
        .bind(record.version())
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| repository_error("在庫の登録に失敗しました", e))?;

        Ok(())
    }

    async fn find_by_product_id(
        &self,
        product_id: ProductId,
    ) -> Result<Option<InventoryRecord>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM inventories WHERE product_id = ? AND deleted_at IS NULL",
            INVENTORY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(product_id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| repository_error("在庫の取得に失敗しました", e))?;

        row.as_ref().map(to_inventory).transpose()
    }

    async fn list(&self, page: PageRequest) -> Result<Page<InventoryRecord>, RepositoryError> {
        self.fetch_page("deleted_at IS NULL", "product_id ASC", page)
            .await
    }

    async fn list_low_stock(
        &self,
        page: PageRequest,
    ) -> Result<Page<InventoryRecord>, RepositoryError> {
        self.fetch_page(
            "deleted_at IS NULL AND available_stock <= low_stock_threshold",
            "available_stock ASC, product_id ASC",
            page,
        )
        .await
    }

    async fn update_low_stock_threshold(
        &self,
        product_id: ProductId,
        threshold: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE inventories
            SET low_stock_threshold = ?, updated_at = ?
            WHERE product_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(threshold)
        .bind(now)
        .bind(product_id.value())
        .execute(&self.pool)
        .await
        .map_err(|e| repository_error("しきい値の更新に失敗しました", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn soft_delete(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE inventories
            SET deleted_at = ?, updated_at = ?
            WHERE product_id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(product_id.value())
        .execute(&self.pool)
        .await
        .map_err(|e| repository_error("在庫の削除に失敗しました", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_logs_by_product(
        &self,
        product_id: ProductId,
        page: PageRequest,
    ) -> Result<Page<InventoryLogEntry>, RepositoryError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inventory_logs WHERE product_id = ?")
                .bind(product_id.value())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| repository_error("在庫ログ件数の取得に失敗しました", e))?;

        let rows = sqlx::query(
            r#"
            SELECT id, product_id, order_id, change_type, quantity_change,
                   before_available, after_available, before_reserved, after_reserved,
                   reason, operator_id, created_at
            FROM inventory_logs
            WHERE product_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(product_id.value())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| repository_error("在庫ログの取得に失敗しました", e))?;

        let entries = rows
            .iter()
            .map(to_inventory_log)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(entries, total.max(0) as u64, page))
    }

    async fn find_expired_reservations(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM inventory_reservations \
             WHERE status = ? AND expires_at < ? ORDER BY expires_at ASC LIMIT ?",
            RESERVATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(ReservationStatus::Active.as_str())
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| repository_error("期限切れ予約の取得に失敗しました", e))?;

        rows.iter().map(to_reservation).collect()
    }

    async fn find_reservations_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM inventory_reservations WHERE order_id = ? ORDER BY product_id ASC",
            RESERVATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(order_id.value())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| repository_error("注文の予約の取得に失敗しました", e))?;

        rows.iter().map(to_reservation).collect()
    }
}
