// アプリケーションサービスの入力と出力

use crate::domain::model::{
    Money, OperatorId, OrderId, OrderLine, ProductId, Receiver, ReleaseTarget, UserId,
};

/// 在庫登録
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInventoryCommand {
    pub product_id: ProductId,
    pub initial_stock: i32,
    pub low_stock_threshold: i32,
}

/// 在庫予約
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveStockCommand {
    pub product_id: ProductId,
    pub quantity: i32,
    pub order_id: OrderId,
    /// 予約の有効期間（未指定なら設定値）
    pub ttl: Option<chrono::Duration>,
}

/// 予約の解放
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseStockCommand {
    pub product_id: ProductId,
    pub quantity: i32,
    pub order_id: OrderId,
    pub target: ReleaseTarget,
}

/// 予約分の出庫確定
#[derive(Debug, Clone, PartialEq)]
pub struct DeductStockCommand {
    pub product_id: ProductId,
    pub quantity: i32,
    pub order_id: OrderId,
}

/// 入荷
#[derive(Debug, Clone, PartialEq)]
pub struct RestockCommand {
    pub product_id: ProductId,
    pub quantity: i32,
    pub reason: Option<String>,
    pub operator_id: Option<OperatorId>,
}

/// 在庫調整（棚卸し差異など）
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustStockCommand {
    pub product_id: ProductId,
    pub delta: i32,
    pub reason: Option<String>,
    pub operator_id: Option<OperatorId>,
}

/// 在庫確認の対象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockCheckItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// 在庫確認の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockCheck {
    pub product_id: ProductId,
    pub available: i32,
    pub reserved: i32,
    pub requested: i32,
    pub is_available: bool,
}

/// 期限切れ予約の回収結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// 対象として取得した件数
    pub scanned: usize,
    /// 解放に成功した件数
    pub released: usize,
    /// 解放に失敗した件数（次回に再試行される）
    pub failed: usize,
}

/// 注文作成
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderCommand {
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub receiver: Receiver,
    pub discount_amount: Money,
    pub shipping_fee: Money,
    pub remark: Option<String>,
}
