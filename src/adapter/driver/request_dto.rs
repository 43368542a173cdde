use crate::domain::model::PageRequest;
use serde::{Deserialize, Serialize};

/// 在庫登録用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CreateInventoryRequest {
    pub product_id: i64,
    pub initial_stock: i32,
    #[serde(default)]
    pub low_stock_threshold: i32,
}

/// しきい値更新用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct UpdateThresholdRequest {
    pub low_stock_threshold: i32,
}

/// 予約用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct ReserveStockRequest {
    pub order_id: i64,
    pub quantity: i32,
    /// 予約の有効期間（秒）。未指定なら設定値
    pub ttl_seconds: Option<i64>,
}

/// 解放・出庫確定用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct SettleStockRequest {
    pub order_id: i64,
    pub quantity: i32,
}

/// 入荷用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct RestockRequest {
    pub quantity: i32,
    pub reason: Option<String>,
}

/// 在庫調整用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i32,
    pub reason: Option<String>,
}

/// 在庫確認の対象
#[derive(Serialize, Deserialize)]
pub struct StockCheckItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// 一括在庫確認用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct BatchStockCheckRequest {
    pub items: Vec<StockCheckItemRequest>,
}

/// 注文明細
#[derive(Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// 注文作成用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    pub receiver_zip_code: Option<String>,
    #[serde(default)]
    pub discount_amount: i64,
    #[serde(default)]
    pub shipping_fee: i64,
    pub remark: Option<String>,
}

/// ページ指定のクエリパラメータ
#[derive(Deserialize, Default)]
pub struct PageQueryParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQueryParams {
    pub fn to_page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

/// 在庫確認のクエリパラメータ
#[derive(Deserialize)]
pub struct AvailabilityQueryParams {
    pub quantity: i32,
}
