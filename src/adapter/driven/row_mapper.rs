// MySQLの行からドメインモデルへの変換

use crate::domain::model::{
    ChangeType, InventoryLogEntry, InventoryRecord, Money, OperatorId, Order, OrderDraft, OrderId,
    OrderItem, OrderStatus, OrderTimeline, ProductId, Receiver, Reservation, ReservationStatus,
    StockSnapshot, UserId,
};
use crate::domain::port::RepositoryError;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::Row;

/// 在庫テーブルのSELECT列
pub(crate) const INVENTORY_COLUMNS: &str = "product_id, available_stock, reserved_stock, \
     low_stock_threshold, version, created_at, updated_at";

/// 予約テーブルのSELECT列
pub(crate) const RESERVATION_COLUMNS: &str =
    "product_id, order_id, quantity, status, expires_at, created_at, updated_at";

/// 注文テーブルのSELECT列
pub(crate) const ORDER_COLUMNS: &str = "id, order_no, user_id, total_amount, discount_amount, \
     shipping_fee, pay_amount, status, receiver_name, receiver_phone, receiver_address, \
     receiver_zip_code, remark, paid_at, shipped_at, completed_at, cancelled_at, created_at, \
     updated_at";

fn column<'r, T>(row: &'r MySqlRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::FetchFailed(format!("列 {} の取得に失敗しました: {}", name, e)))
}

fn money(row: &MySqlRow, name: &str) -> Result<Money, RepositoryError> {
    Money::new(column(row, name)?)
        .map_err(|e| RepositoryError::FetchFailed(format!("金額の解析に失敗しました: {}", e)))
}

pub(crate) fn to_inventory(row: &MySqlRow) -> Result<InventoryRecord, RepositoryError> {
    Ok(InventoryRecord::reconstruct(
        ProductId::new(column(row, "product_id")?),
        column(row, "available_stock")?,
        column(row, "reserved_stock")?,
        column(row, "low_stock_threshold")?,
        column(row, "version")?,
        column(row, "created_at")?,
        column(row, "updated_at")?,
    ))
}

pub(crate) fn to_reservation(row: &MySqlRow) -> Result<Reservation, RepositoryError> {
    let status: String = column(row, "status")?;
    let status = ReservationStatus::from_string(&status)
        .map_err(|e| RepositoryError::FetchFailed(format!("予約ステータスの解析に失敗しました: {}", e)))?;
    Ok(Reservation::reconstruct(
        ProductId::new(column(row, "product_id")?),
        OrderId::new(column(row, "order_id")?),
        column(row, "quantity")?,
        status,
        column(row, "expires_at")?,
        column(row, "created_at")?,
        column(row, "updated_at")?,
    ))
}

pub(crate) fn to_inventory_log(row: &MySqlRow) -> Result<InventoryLogEntry, RepositoryError> {
    let change_type: String = column(row, "change_type")?;
    let change_type = ChangeType::from_string(&change_type)
        .map_err(|e| RepositoryError::FetchFailed(format!("変更種別の解析に失敗しました: {}", e)))?;
    let order_id: Option<i64> = column(row, "order_id")?;
    let operator_id: Option<i64> = column(row, "operator_id")?;
    Ok(InventoryLogEntry::reconstruct(
        column(row, "id")?,
        ProductId::new(column(row, "product_id")?),
        order_id.map(OrderId::new),
        change_type,
        column(row, "quantity_change")?,
        StockSnapshot {
            available: column(row, "before_available")?,
            reserved: column(row, "before_reserved")?,
        },
        StockSnapshot {
            available: column(row, "after_available")?,
            reserved: column(row, "after_reserved")?,
        },
        column(row, "reason")?,
        operator_id.map(OperatorId::new),
        column(row, "created_at")?,
    ))
}

pub(crate) fn to_order_item(row: &MySqlRow) -> Result<OrderItem, RepositoryError> {
    Ok(OrderItem::reconstruct(
        ProductId::new(column(row, "product_id")?),
        column(row, "product_name")?,
        column(row, "product_image")?,
        column(row, "quantity")?,
        money(row, "unit_price")?,
        money(row, "total_price")?,
    ))
}

/// 注文行と明細から注文を組み立てる
pub(crate) fn to_order(row: &MySqlRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let status: String = column(row, "status")?;
    let status = OrderStatus::from_string(&status)
        .map_err(|e| RepositoryError::FetchFailed(format!("注文ステータスの解析に失敗しました: {}", e)))?;
    let receiver = Receiver::new(
        column::<String>(row, "receiver_name")?,
        column::<String>(row, "receiver_phone")?,
        column::<String>(row, "receiver_address")?,
        column::<Option<String>>(row, "receiver_zip_code")?,
    )
    .map_err(|e| RepositoryError::FetchFailed(format!("受取人情報の解析に失敗しました: {}", e)))?;
    let created_at: DateTime<Utc> = column(row, "created_at")?;

    let draft = OrderDraft::reconstruct(
        column(row, "order_no")?,
        UserId::new(column(row, "user_id")?),
        items,
        money(row, "total_amount")?,
        money(row, "discount_amount")?,
        money(row, "shipping_fee")?,
        money(row, "pay_amount")?,
        receiver,
        column(row, "remark")?,
        created_at,
    );
    let timeline = OrderTimeline {
        paid_at: column(row, "paid_at")?,
        shipped_at: column(row, "shipped_at")?,
        completed_at: column(row, "completed_at")?,
        cancelled_at: column(row, "cancelled_at")?,
        updated_at: column(row, "updated_at")?,
    };
    Ok(Order::reconstruct(
        OrderId::new(column(row, "id")?),
        draft,
        status,
        timeline,
    ))
}
