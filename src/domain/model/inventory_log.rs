use crate::domain::error::DomainError;
use crate::domain::model::{InventoryRecord, OperatorId, OrderId, ProductId, StockSnapshot};
use chrono::{DateTime, Utc};
use std::fmt;

/// 在庫変動の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Restock,
    Reserve,
    Release,
    Deduct,
    Adjust,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Restock => "restock",
            ChangeType::Reserve => "reserve",
            ChangeType::Release => "release",
            ChangeType::Deduct => "deduct",
            ChangeType::Adjust => "adjust",
        }
    }

    /// 文字列からChangeTypeを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "restock" => Ok(ChangeType::Restock),
            "reserve" => Ok(ChangeType::Reserve),
            "release" => Ok(ChangeType::Release),
            "deduct" => Ok(ChangeType::Deduct),
            "adjust" => Ok(ChangeType::Adjust),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な在庫変動種別: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 在庫監査ログのエントリ
/// 在庫の変更が確定するたびに1件追記され、更新されることはない
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryLogEntry {
    id: Option<i64>,
    product_id: ProductId,
    order_id: Option<OrderId>,
    change_type: ChangeType,
    quantity_change: i32,
    before: StockSnapshot,
    after: StockSnapshot,
    reason: Option<String>,
    operator_id: Option<OperatorId>,
    created_at: DateTime<Utc>,
}

impl InventoryLogEntry {
    /// 変更前後の在庫レコードからログエントリを作成
    ///
    /// # Arguments
    /// * `change_type` - 変動の種類
    /// * `quantity_change` - 変動量（予約・入荷は正、解放・出庫は負、調整は差分）
    /// * `before` - 変更前の在庫レコード
    /// * `after` - 変更後の在庫レコード
    /// * `now` - 記録日時
    pub fn record(
        change_type: ChangeType,
        quantity_change: i32,
        before: &InventoryRecord,
        after: &InventoryRecord,
        now: DateTime<Utc>,
    ) -> Self {
        Self::from_snapshots(
            after.product_id(),
            change_type,
            quantity_change,
            before.snapshot(),
            after.snapshot(),
            now,
        )
    }

    /// 変更前後のスナップショットからログエントリを作成
    pub fn from_snapshots(
        product_id: ProductId,
        change_type: ChangeType,
        quantity_change: i32,
        before: StockSnapshot,
        after: StockSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            product_id,
            order_id: None,
            change_type,
            quantity_change,
            before,
            after,
            reason: None,
            operator_id: None,
            created_at: now,
        }
    }

    /// 関連する注文を設定
    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// 変更理由を設定
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// 操作者を設定
    pub fn with_operator(mut self, operator_id: Option<OperatorId>) -> Self {
        self.operator_id = operator_id;
        self
    }

    /// データベースから取得したデータでログエントリを再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: i64,
        product_id: ProductId,
        order_id: Option<OrderId>,
        change_type: ChangeType,
        quantity_change: i32,
        before: StockSnapshot,
        after: StockSnapshot,
        reason: Option<String>,
        operator_id: Option<OperatorId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            product_id,
            order_id,
            change_type,
            quantity_change,
            before,
            after,
            reason,
            operator_id,
            created_at,
        }
    }

    /// 採番済みIDを付与したエントリを返す
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn change_type(&self) -> ChangeType {
        self.change_type
    }

    pub fn quantity_change(&self) -> i32 {
        self.quantity_change
    }

    pub fn before(&self) -> StockSnapshot {
        self.before
    }

    pub fn after(&self) -> StockSnapshot {
        self.after
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn operator_id(&self) -> Option<OperatorId> {
        self.operator_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_captures_before_and_after() {
        let now = Utc::now();
        let before = InventoryRecord::new(ProductId::new(3), 10, 2, now).unwrap();
        let after = before.reserve(4, now).unwrap();

        let entry = InventoryLogEntry::record(ChangeType::Reserve, 4, &before, &after, now)
            .with_order(OrderId::new(9))
            .with_reason("Stock reserved for order");

        assert_eq!(entry.id(), None);
        assert_eq!(entry.product_id(), ProductId::new(3));
        assert_eq!(entry.order_id(), Some(OrderId::new(9)));
        assert_eq!(entry.before(), StockSnapshot { available: 10, reserved: 0 });
        assert_eq!(entry.after(), StockSnapshot { available: 6, reserved: 4 });
        assert_eq!(entry.reason(), Some("Stock reserved for order"));
        assert_eq!(entry.operator_id(), None);
    }

    #[test]
    fn test_change_type_strings() {
        for change_type in [
            ChangeType::Restock,
            ChangeType::Reserve,
            ChangeType::Release,
            ChangeType::Deduct,
            ChangeType::Adjust,
        ] {
            assert_eq!(ChangeType::from_string(change_type.as_str()).unwrap(), change_type);
        }
        assert!(ChangeType::from_string("unknown").is_err());
    }
}
