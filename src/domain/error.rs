use crate::domain::model::ProductId;

/// ドメイン層のエラー型
/// ビジネスルール違反を表現する
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// 在庫不足（利用可能数が要求数を下回る）
    #[error("product {product_id} insufficient stock, available: {available}, requested: {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i32,
        requested: i32,
    },
    /// 在庫調整の結果が負になる
    #[error("invalid adjustment for product {product_id}: available {available}, delta {delta}")]
    InvalidAdjustment {
        product_id: ProductId,
        available: i32,
        delta: i32,
    },
    /// 許可されていない状態遷移（予約・注文）
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
    /// 無効な数量（0以下など）
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),
    /// 無効な値
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
