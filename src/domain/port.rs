// 出力ポート
// ドメイン層が外部に依存する機能をトレイトとして定義
// アダプター層でこれらのトレイトを実装する

use crate::domain::model::{
    InventoryLogEntry, InventoryRecord, Order, OrderDraft, OrderId, OrderStatus, Page,
    PageRequest, Product, ProductId, Reservation, ReservationStatus, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// ロガートレイト
/// ログ出力を抽象化するポート
pub trait Logger: Send + Sync {
    /// デバッグレベルのログを出力
    fn debug(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 情報レベルのログを出力
    fn info(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// 警告レベルのログを出力
    fn warn(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );

    /// エラーレベルのログを出力
    fn error(
        &self,
        component: &str,
        message: &str,
        correlation_id: Option<Uuid>,
        context: Option<HashMap<String, String>>,
    );
}

/// 現在時刻の取得を抽象化するポート
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// リポジトリエラー型
/// リポジトリ操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    /// データベース接続に失敗
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// 操作に失敗
    #[error("Operation failed: {0}")]
    OperationFailed(String),
    /// データの取得に失敗
    #[error("Fetch failed: {0}")]
    FetchFailed(String),
    /// 一意制約違反
    #[error("Unique violation: {0}")]
    UniqueViolation(String),
    /// 同時実行による競合（デッドロック・直列化失敗・コミット時の検証失敗）
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// 作業単位（トランザクション）
///
/// 1つの作業単位で行った書き込みは `commit` ですべて確定し、
/// `rollback` またはコミット前の破棄ですべて取り消される。
/// 条件付き更新は条件に一致した行がなければ `Ok(false)` を返す。
#[async_trait]
pub trait UnitOfWork: Send {
    /// 商品IDで在庫レコードを取得する（削除済みは含まない）
    async fn find_inventory(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<InventoryRecord>, RepositoryError>;

    /// バージョンが一致する場合のみ在庫レコードを更新する
    ///
    /// # Arguments
    /// * `next` - 更新後の在庫レコード（バージョンは進めた値）
    /// * `expected_version` - 読み込み時のバージョン
    ///
    /// # Returns
    /// * `Ok(true)` - 更新成功
    /// * `Ok(false)` - バージョン不一致（他のトランザクションが先に更新した）
    async fn update_inventory_if_version(
        &mut self,
        next: &InventoryRecord,
        expected_version: i64,
    ) -> Result<bool, RepositoryError>;

    /// 利用可能数を無条件に加算し、バージョンを1つ進める
    ///
    /// # Returns
    /// * `Ok(false)` - 在庫レコードが存在しない
    async fn increment_available(
        &mut self,
        product_id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// 予約を登録する
    /// 同じ商品・注文の組が既に存在する場合は `UniqueViolation`
    async fn insert_reservation(&mut self, reservation: &Reservation)
        -> Result<(), RepositoryError>;

    /// 商品・注文の組で予約を取得する
    async fn find_reservation(
        &mut self,
        product_id: ProductId,
        order_id: OrderId,
    ) -> Result<Option<Reservation>, RepositoryError>;

    /// 予約ステータスが `from` の場合のみ `to` に更新する
    async fn update_reservation_status(
        &mut self,
        product_id: ProductId,
        order_id: OrderId,
        from: ReservationStatus,
        to: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// 在庫監査ログを追記する
    async fn append_inventory_log(&mut self, entry: &InventoryLogEntry)
        -> Result<(), RepositoryError>;

    /// 注文と注文明細を登録し、採番済みの注文を返す
    async fn insert_order(&mut self, draft: &OrderDraft) -> Result<Order, RepositoryError>;

    /// 注文IDで注文を取得する
    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// 注文ステータスが `from` の場合のみ、注文のステータスと日時を更新する
    async fn update_order_status(
        &mut self,
        order: &Order,
        from: OrderStatus,
    ) -> Result<bool, RepositoryError>;

    /// コミットする
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    /// ロールバックする
    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// トランザクション管理
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// 新しい作業単位を開始する
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError>;
}

/// 在庫リポジトリトレイト
/// トランザクション外で行う在庫の参照と管理操作を抽象化する
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// 在庫レコードを登録する
    ///
    /// # Returns
    /// * `Ok(())` - 登録成功
    /// * `Err(RepositoryError::UniqueViolation)` - 同じ商品の在庫が既に存在する
    async fn create(&self, record: &InventoryRecord) -> Result<(), RepositoryError>;

    /// 商品IDで在庫を検索する
    ///
    /// # Returns
    /// * `Ok(Some(InventoryRecord))` - 在庫が見つかった
    /// * `Ok(None)` - 在庫が見つからなかった（削除済みを含む）
    async fn find_by_product_id(
        &self,
        product_id: ProductId,
    ) -> Result<Option<InventoryRecord>, RepositoryError>;

    /// 在庫一覧を商品IDの昇順で取得する
    async fn list(&self, page: PageRequest) -> Result<Page<InventoryRecord>, RepositoryError>;

    /// 利用可能数がしきい値以下の在庫を利用可能数の昇順で取得する
    async fn list_low_stock(
        &self,
        page: PageRequest,
    ) -> Result<Page<InventoryRecord>, RepositoryError>;

    /// 在庫僅少しきい値を更新する
    ///
    /// # Returns
    /// * `Ok(false)` - 在庫が存在しない
    async fn update_low_stock_threshold(
        &self,
        product_id: ProductId,
        threshold: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// 在庫を論理削除する
    async fn soft_delete(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// 商品の在庫監査ログを新しい順に取得する
    async fn find_logs_by_product(
        &self,
        product_id: ProductId,
        page: PageRequest,
    ) -> Result<Page<InventoryLogEntry>, RepositoryError>;

    /// 有効期限切れの有効な予約を期限の古い順に最大 `limit` 件取得する
    async fn find_expired_reservations(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Reservation>, RepositoryError>;

    /// 注文に紐づく予約をすべて取得する
    async fn find_reservations_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Reservation>, RepositoryError>;
}

/// 注文リポジトリトレイト
/// 注文の参照を抽象化する（更新は作業単位で行う）
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// 注文IDで注文を検索する
    ///
    /// # Returns
    /// * `Ok(Some(Order))` - 注文が見つかった
    /// * `Ok(None)` - 注文が見つからなかった
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// 注文番号で注文を検索する
    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<Order>, RepositoryError>;

    /// 利用者の注文を作成日時の降順で取得する
    async fn find_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError>;
}

/// 商品カタログ
/// 注文作成時に商品名と価格を参照する
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// 複数の商品をまとめて取得する
    /// 存在しない商品IDは結果に含まれない
    async fn get_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError>;
}
