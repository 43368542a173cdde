use crate::adapter::database_error::repository_error;
use crate::adapter::driven::row_mapper::{to_order, to_order_item, ORDER_COLUMNS};
use crate::domain::model::{Order, OrderId, OrderItem, Page, PageRequest, UserId};
use crate::domain::port::{OrderRepository, RepositoryError};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{MySql, Pool, Row};

/// MySQL注文リポジトリ
/// 注文の参照を担当する（登録と状態更新は作業単位で行う）
#[derive(Clone)]
pub struct MySqlOrderRepository {
    pool: Pool<MySql>,
}

impl MySqlOrderRepository {
    /// 新しいMySQL注文リポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    ///
    /// # Returns
    /// * MySqlOrderRepositoryのインスタンス
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

/// 注文明細を登録順に取得する
async fn load_items(
    conn: &mut MySqlConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query(
        r#"
        SELECT product_id, product_name, product_image, quantity, unit_price, total_price
        FROM order_items
        WHERE order_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(order_id.value())
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| repository_error("注文明細の取得に失敗しました", e))?;

    rows.iter().map(to_order_item).collect()
}

async fn assemble(conn: &mut MySqlConnection, row: &MySqlRow) -> Result<Order, RepositoryError> {
    let order_id: i64 = row
        .try_get("id")
        .map_err(|e| RepositoryError::FetchFailed(format!("注文IDの取得に失敗しました: {}", e)))?;
    let items = load_items(conn, OrderId::new(order_id)).await?;
    to_order(row, items)
}

/// 注文と明細を1つの接続で取得する
/// 作業単位の中からも同じ処理で読み込む
pub(crate) async fn load_order(
    conn: &mut MySqlConnection,
    order_id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    let sql = format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(order_id.value())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| repository_error("注文の取得に失敗しました", e))?;

    match row {
        Some(row) => Ok(Some(assemble(conn, &row).await?)),
        None => Ok(None),
    }
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| repository_error("接続の取得に失敗しました", e))?;
        load_order(&mut conn, order_id).await
    }

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| repository_error("接続の取得に失敗しました", e))?;

        let sql = format!("SELECT {} FROM orders WHERE order_no = ?", ORDER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(order_no)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| repository_error("注文番号による注文の取得に失敗しました", e))?;

        match row {
            Some(row) => Ok(Some(assemble(&mut conn, &row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| repository_error("接続の取得に失敗しました", e))?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = ?")
            .bind(user_id.value())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| repository_error("注文件数の取得に失敗しました", e))?;

        // 作成日時の降順、同時刻はIDの降順
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            ORDER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.value())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| repository_error("注文一覧の取得に失敗しました", e))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            orders.push(assemble(&mut conn, row).await?);
        }

        Ok(Page::new(orders, total.max(0) as u64, page))
    }
}
