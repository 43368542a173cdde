use crate::application::command::{CleanupReport, StockCheck};
use crate::domain::model::{
    InventoryLogEntry, InventoryRecord, Order, OrderItem, Page, Reservation,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339()
}

/// ページング結果のレスポンスDTO
#[derive(Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> PageResponse<T> {
    /// ページング結果の各要素を変換して作成
    pub fn from_page<S>(page: Page<S>, f: impl FnMut(S) -> T) -> Self {
        let total_pages = page.total_pages();
        let page = page.map(f);
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            total_pages,
        }
    }
}

/// 在庫用のレスポンスDTO
#[derive(Serialize)]
pub struct InventoryResponse {
    pub product_id: i64,
    pub available_stock: i32,
    pub reserved_stock: i32,
    pub total_stock: i32,
    pub low_stock_threshold: i32,
    pub is_low_stock: bool,
    pub version: i64,
    pub updated_at: String,
}

impl InventoryResponse {
    /// ドメインオブジェクトからInventoryResponseを作成
    pub fn from_record(record: &InventoryRecord) -> Self {
        Self {
            product_id: record.product_id().value(),
            available_stock: record.available(),
            reserved_stock: record.reserved(),
            total_stock: record.total(),
            low_stock_threshold: record.low_stock_threshold(),
            is_low_stock: record.is_low_stock(),
            version: record.version(),
            updated_at: format_time(record.updated_at()),
        }
    }
}

/// 予約用のレスポンスDTO
#[derive(Serialize)]
pub struct ReservationResponse {
    pub product_id: i64,
    pub order_id: i64,
    pub quantity: i32,
    pub status: String,
    pub expires_at: String,
    pub created_at: String,
}

impl ReservationResponse {
    pub fn from_reservation(reservation: &Reservation) -> Self {
        Self {
            product_id: reservation.product_id().value(),
            order_id: reservation.order_id().value(),
            quantity: reservation.quantity(),
            status: reservation.status().to_string(),
            expires_at: format_time(reservation.expires_at()),
            created_at: format_time(reservation.created_at()),
        }
    }
}

/// 在庫監査ログ用のレスポンスDTO
#[derive(Serialize)]
pub struct InventoryLogResponse {
    pub id: Option<i64>,
    pub product_id: i64,
    pub order_id: Option<i64>,
    pub change_type: String,
    pub quantity_change: i32,
    pub before_available: i32,
    pub after_available: i32,
    pub before_reserved: i32,
    pub after_reserved: i32,
    pub reason: Option<String>,
    pub operator_id: Option<i64>,
    pub created_at: String,
}

impl InventoryLogResponse {
    pub fn from_entry(entry: &InventoryLogEntry) -> Self {
        Self {
            id: entry.id(),
            product_id: entry.product_id().value(),
            order_id: entry.order_id().map(|id| id.value()),
            change_type: entry.change_type().as_str().to_string(),
            quantity_change: entry.quantity_change(),
            before_available: entry.before().available,
            after_available: entry.after().available,
            before_reserved: entry.before().reserved,
            after_reserved: entry.after().reserved,
            reason: entry.reason().map(str::to_string),
            operator_id: entry.operator_id().map(|id| id.value()),
            created_at: format_time(entry.created_at()),
        }
    }
}

/// 在庫確認用のレスポンスDTO
#[derive(Serialize)]
pub struct StockCheckResponse {
    pub product_id: i64,
    pub available_stock: i32,
    pub reserved_stock: i32,
    pub requested: i32,
    pub is_available: bool,
}

impl StockCheckResponse {
    pub fn from_check(check: &StockCheck) -> Self {
        Self {
            product_id: check.product_id.value(),
            available_stock: check.available,
            reserved_stock: check.reserved,
            requested: check.requested,
            is_available: check.is_available,
        }
    }
}

/// 期限切れ予約回収用のレスポンスDTO
#[derive(Serialize)]
pub struct CleanupResponse {
    pub scanned: usize,
    pub released: usize,
    pub failed: usize,
}

impl From<CleanupReport> for CleanupResponse {
    fn from(report: CleanupReport) -> Self {
        Self {
            scanned: report.scanned,
            released: report.released,
            failed: report.failed,
        }
    }
}

/// 注文明細用のレスポンスDTO
#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: i64,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: i32,
    pub unit_price: i64,
    pub total_price: i64,
}

impl OrderItemResponse {
    fn from_item(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id().value(),
            product_name: item.product_name().to_string(),
            product_image: item.product_image().map(str::to_string),
            quantity: item.quantity(),
            unit_price: item.unit_price().amount(),
            total_price: item.total_price().amount(),
        }
    }
}

/// 受取人用のレスポンスDTO
#[derive(Serialize)]
pub struct ReceiverResponse {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub zip_code: Option<String>,
}

/// 注文用のレスポンスDTO
#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub order_no: String,
    pub user_id: i64,
    pub status: String,
    pub total_amount: i64,
    pub discount_amount: i64,
    pub shipping_fee: i64,
    pub pay_amount: i64,
    pub receiver: ReceiverResponse,
    pub remark: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub paid_at: Option<String>,
    pub shipped_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl OrderResponse {
    /// ドメインオブジェクトからOrderResponseを作成
    pub fn from_order(order: &Order) -> Self {
        let details = order.details();
        let receiver = details.receiver();
        let timeline = order.timeline();
        Self {
            id: order.id().value(),
            order_no: details.order_no().to_string(),
            user_id: order.user_id().value(),
            status: order.status().to_string(),
            total_amount: details.total_amount().amount(),
            discount_amount: details.discount_amount().amount(),
            shipping_fee: details.shipping_fee().amount(),
            pay_amount: details.pay_amount().amount(),
            receiver: ReceiverResponse {
                name: receiver.name().to_string(),
                phone: receiver.phone().to_string(),
                address: receiver.address().to_string(),
                zip_code: receiver.zip_code().map(str::to_string),
            },
            remark: details.remark().map(str::to_string),
            items: order.items().iter().map(OrderItemResponse::from_item).collect(),
            paid_at: timeline.paid_at.map(format_time),
            shipped_at: timeline.shipped_at.map(format_time),
            completed_at: timeline.completed_at.map(format_time),
            cancelled_at: timeline.cancelled_at.map(format_time),
            created_at: format_time(details.created_at()),
            updated_at: format_time(timeline.updated_at),
        }
    }
}
