use axum::{
    async_trait,
    extract::{rejection::JsonRejection, rejection::QueryRejection, FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::adapter::driver::request_dto::{
    AdjustStockRequest, AvailabilityQueryParams, BatchStockCheckRequest, CreateInventoryRequest,
    CreateOrderRequest, PageQueryParams, ReserveStockRequest, RestockRequest, SettleStockRequest,
    UpdateThresholdRequest,
};
use crate::adapter::driver::response_dto::{
    CleanupResponse, InventoryLogResponse, InventoryResponse, OrderResponse, PageResponse,
    ReservationResponse, StockCheckResponse,
};
use crate::application::command::{
    AdjustStockCommand, CreateInventoryCommand, CreateOrderCommand, DeductStockCommand,
    ReleaseStockCommand, ReserveStockCommand, RestockCommand, StockCheckItem,
};
use crate::application::service::{InventoryService, OrderService};
use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{
    Money, OperatorId, OrderId, OrderLine, ProductId, Receiver, ReleaseTarget, UserId,
};

/// 利用者IDを渡すヘッダー
pub const USER_ID_HEADER: &str = "x-user-id";
/// 在庫操作の担当者IDを渡すヘッダー
pub const OPERATOR_ID_HEADER: &str = "x-operator-id";

#[derive(Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

// アプリケーションサービスを含む状態
#[derive(Clone)]
pub struct AppState {
    pub inventory_service: Arc<InventoryService>,
    pub order_service: Arc<OrderService>,
}

/// リクエストを行った利用者
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(USER_ID_HEADER).ok_or_else(|| {
            api_error(
                StatusCode::UNAUTHORIZED,
                "MISSING_USER",
                "X-User-Id ヘッダーが必要です",
            )
        })?;
        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|id| CurrentUser(UserId::new(id)))
            .ok_or_else(|| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    "INVALID_USER",
                    "X-User-Id ヘッダーの形式が不正です",
                )
            })
    }
}

/// 在庫操作を行った担当者（任意）
pub struct Operator(pub Option<OperatorId>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Operator {
    type Rejection = (StatusCode, Json<ApiError>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(OPERATOR_ID_HEADER) else {
            return Ok(Operator(None));
        };
        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map(|id| Operator(Some(OperatorId::new(id))))
            .ok_or_else(|| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    "INVALID_OPERATOR",
                    "X-Operator-Id ヘッダーの形式が不正です",
                )
            })
    }
}

// REST APIルーターを作成
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/inventories", post(create_inventory).get(list_inventories))
        .route("/inventories/low-stock", get(list_low_stock))
        .route("/inventories/availability", post(batch_check_availability))
        .route("/inventories/reservations/cleanup", post(cleanup_expired_reservations))
        .route(
            "/inventories/:product_id",
            get(get_inventory).delete(remove_inventory),
        )
        .route("/inventories/:product_id/threshold", put(update_threshold))
        .route("/inventories/:product_id/logs", get(get_inventory_logs))
        .route("/inventories/:product_id/availability", get(check_availability))
        .route("/inventories/:product_id/reserve", post(reserve_stock))
        .route("/inventories/:product_id/release", post(release_stock))
        .route("/inventories/:product_id/deduct", post(deduct_stock))
        .route("/inventories/:product_id/restock", post(restock))
        .route("/inventories/:product_id/adjust", post(adjust_stock))
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/order-no/:order_no", get(get_order_by_order_no))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/pay", post(pay_order))
        .route("/orders/:order_id/ship", post(ship_order))
        .route("/orders/:order_id/complete", post(complete_order))
        .route("/orders/:order_id/cancel", post(cancel_order))
        .route("/orders/:order_id/reservations", get(get_order_reservations))
}

// ヘルスチェックエンドポイント
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "stock-reservation-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value).map_err(|rejection| {
        api_error(StatusCode::BAD_REQUEST, "INVALID_BODY", rejection.body_text())
    })
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "INVALID_PARAMETER", "無効なクエリパラメータです"))
}

// 在庫登録エンドポイント
async fn create_inventory(
    State(state): State<AppState>,
    body: Result<Json<CreateInventoryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<InventoryResponse>)> {
    let request = json_body(body)?;
    let command = CreateInventoryCommand {
        product_id: ProductId::new(request.product_id),
        initial_stock: request.initial_stock,
        low_stock_threshold: request.low_stock_threshold,
    };

    match state.inventory_service.create_inventory(command).await {
        Ok(record) => Ok((StatusCode::CREATED, Json(InventoryResponse::from_record(&record)))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 在庫一覧取得エンドポイント
async fn list_inventories(
    State(state): State<AppState>,
    query: Result<Query<PageQueryParams>, QueryRejection>,
) -> ApiResult<Json<PageResponse<InventoryResponse>>> {
    let params = query_params(query)?;
    let page = state
        .inventory_service
        .list_inventories(params.to_page_request())
        .await
        .map_err(map_application_error)?;
    Ok(Json(PageResponse::from_page(page, |record| {
        InventoryResponse::from_record(&record)
    })))
}

// 在庫僅少一覧取得エンドポイント
async fn list_low_stock(
    State(state): State<AppState>,
    query: Result<Query<PageQueryParams>, QueryRejection>,
) -> ApiResult<Json<PageResponse<InventoryResponse>>> {
    let params = query_params(query)?;
    let page = state
        .inventory_service
        .list_low_stock(params.to_page_request())
        .await
        .map_err(map_application_error)?;
    Ok(Json(PageResponse::from_page(page, |record| {
        InventoryResponse::from_record(&record)
    })))
}

// 在庫詳細取得エンドポイント
async fn get_inventory(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> ApiResult<Json<InventoryResponse>> {
    match state
        .inventory_service
        .get_inventory(ProductId::new(product_id))
        .await
    {
        Ok(record) => Ok(Json(InventoryResponse::from_record(&record))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 在庫削除エンドポイント（論理削除）
async fn remove_inventory(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> ApiResult<StatusCode> {
    match state
        .inventory_service
        .remove_inventory(ProductId::new(product_id))
        .await
    {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(map_application_error(err)),
    }
}

// しきい値更新エンドポイント
async fn update_threshold(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    body: Result<Json<UpdateThresholdRequest>, JsonRejection>,
) -> ApiResult<Json<InventoryResponse>> {
    let request = json_body(body)?;
    let record = state
        .inventory_service
        .update_low_stock_threshold(ProductId::new(product_id), request.low_stock_threshold)
        .await
        .map_err(map_application_error)?;
    Ok(Json(InventoryResponse::from_record(&record)))
}

// 在庫監査ログ取得エンドポイント
async fn get_inventory_logs(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    query: Result<Query<PageQueryParams>, QueryRejection>,
) -> ApiResult<Json<PageResponse<InventoryLogResponse>>> {
    let params = query_params(query)?;
    let page = state
        .inventory_service
        .get_inventory_logs(ProductId::new(product_id), params.to_page_request())
        .await
        .map_err(map_application_error)?;
    Ok(Json(PageResponse::from_page(page, |entry| {
        InventoryLogResponse::from_entry(&entry)
    })))
}

// 在庫確認エンドポイント
async fn check_availability(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    query: Result<Query<AvailabilityQueryParams>, QueryRejection>,
) -> ApiResult<Json<StockCheckResponse>> {
    let params = query_params(query)?;
    let check = state
        .inventory_service
        .check_stock_availability(ProductId::new(product_id), params.quantity)
        .await
        .map_err(map_application_error)?;
    Ok(Json(StockCheckResponse::from_check(&check)))
}

// 一括在庫確認エンドポイント
async fn batch_check_availability(
    State(state): State<AppState>,
    body: Result<Json<BatchStockCheckRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<StockCheckResponse>>> {
    let request = json_body(body)?;
    let items: Vec<StockCheckItem> = request
        .items
        .iter()
        .map(|item| StockCheckItem {
            product_id: ProductId::new(item.product_id),
            quantity: item.quantity,
        })
        .collect();
    let checks = state
        .inventory_service
        .batch_check_stock_availability(&items)
        .await
        .map_err(map_application_error)?;
    Ok(Json(checks.iter().map(StockCheckResponse::from_check).collect()))
}

// 在庫予約エンドポイント
async fn reserve_stock(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    body: Result<Json<ReserveStockRequest>, JsonRejection>,
) -> ApiResult<Json<InventoryResponse>> {
    let request = json_body(body)?;
    let ttl = match request.ttl_seconds {
        Some(seconds) if seconds <= 0 => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_VALUE",
                "ttl_seconds は1以上である必要があります",
            ))
        }
        Some(seconds) => Some(chrono::Duration::seconds(seconds)),
        None => None,
    };
    let command = ReserveStockCommand {
        product_id: ProductId::new(product_id),
        quantity: request.quantity,
        order_id: OrderId::new(request.order_id),
        ttl,
    };
    let record = state
        .inventory_service
        .reserve_stock(command)
        .await
        .map_err(map_application_error)?;
    Ok(Json(InventoryResponse::from_record(&record)))
}

// 予約解放エンドポイント
async fn release_stock(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    body: Result<Json<SettleStockRequest>, JsonRejection>,
) -> ApiResult<Json<InventoryResponse>> {
    let request = json_body(body)?;
    let command = ReleaseStockCommand {
        product_id: ProductId::new(product_id),
        quantity: request.quantity,
        order_id: OrderId::new(request.order_id),
        target: ReleaseTarget::Cancelled,
    };
    let record = state
        .inventory_service
        .release_stock(command)
        .await
        .map_err(map_application_error)?;
    Ok(Json(InventoryResponse::from_record(&record)))
}

// 出庫確定エンドポイント
async fn deduct_stock(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    body: Result<Json<SettleStockRequest>, JsonRejection>,
) -> ApiResult<Json<InventoryResponse>> {
    let request = json_body(body)?;
    let command = DeductStockCommand {
        product_id: ProductId::new(product_id),
        quantity: request.quantity,
        order_id: OrderId::new(request.order_id),
    };
    let record = state
        .inventory_service
        .deduct_stock(command)
        .await
        .map_err(map_application_error)?;
    Ok(Json(InventoryResponse::from_record(&record)))
}

// 入荷エンドポイント
async fn restock(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Operator(operator_id): Operator,
    body: Result<Json<RestockRequest>, JsonRejection>,
) -> ApiResult<Json<InventoryResponse>> {
    let request = json_body(body)?;
    let command = RestockCommand {
        product_id: ProductId::new(product_id),
        quantity: request.quantity,
        reason: request.reason,
        operator_id,
    };
    let record = state
        .inventory_service
        .restock(command)
        .await
        .map_err(map_application_error)?;
    Ok(Json(InventoryResponse::from_record(&record)))
}

// 在庫調整エンドポイント
async fn adjust_stock(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Operator(operator_id): Operator,
    body: Result<Json<AdjustStockRequest>, JsonRejection>,
) -> ApiResult<Json<InventoryResponse>> {
    let request = json_body(body)?;
    let command = AdjustStockCommand {
        product_id: ProductId::new(product_id),
        delta: request.delta,
        reason: request.reason,
        operator_id,
    };
    let record = state
        .inventory_service
        .adjust_stock(command)
        .await
        .map_err(map_application_error)?;
    Ok(Json(InventoryResponse::from_record(&record)))
}

// 期限切れ予約の即時回収エンドポイント
async fn cleanup_expired_reservations(
    State(state): State<AppState>,
) -> ApiResult<Json<CleanupResponse>> {
    let report = state
        .inventory_service
        .cleanup_expired_reservations()
        .await
        .map_err(map_application_error)?;
    Ok(Json(report.into()))
}

// 注文作成エンドポイント
async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    let request = json_body(body)?;
    let receiver = Receiver::new(
        request.receiver_name,
        request.receiver_phone,
        request.receiver_address,
        request.receiver_zip_code,
    )
    .map_err(map_domain_error)?;
    let discount_amount = Money::new(request.discount_amount).map_err(map_domain_error)?;
    let shipping_fee = Money::new(request.shipping_fee).map_err(map_domain_error)?;

    let command = CreateOrderCommand {
        user_id,
        lines: request
            .items
            .iter()
            .map(|line| OrderLine {
                product_id: ProductId::new(line.product_id),
                quantity: line.quantity,
            })
            .collect(),
        receiver,
        discount_amount,
        shipping_fee,
        remark: request.remark,
    };

    match state.order_service.create_order(command).await {
        Ok(order) => Ok((StatusCode::CREATED, Json(OrderResponse::from_order(&order)))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 注文一覧取得エンドポイント
async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    query: Result<Query<PageQueryParams>, QueryRejection>,
) -> ApiResult<Json<PageResponse<OrderResponse>>> {
    let params = query_params(query)?;
    let page = state
        .order_service
        .list_user_orders(user_id, params.to_page_request())
        .await
        .map_err(map_application_error)?;
    Ok(Json(PageResponse::from_page(page, |order| {
        OrderResponse::from_order(&order)
    })))
}

// 注文詳細取得エンドポイント
async fn get_order(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<OrderResponse>> {
    match state
        .order_service
        .get_order(user_id, OrderId::new(order_id))
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 注文番号による注文取得エンドポイント
async fn get_order_by_order_no(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(order_no): Path<String>,
) -> ApiResult<Json<OrderResponse>> {
    match state
        .order_service
        .get_order_by_order_no(user_id, &order_no)
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 支払いエンドポイント
async fn pay_order(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .order_service
        .pay_order(user_id, OrderId::new(order_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderResponse::from_order(&order)))
}

// 発送エンドポイント
async fn ship_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .order_service
        .ship_order(OrderId::new(order_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderResponse::from_order(&order)))
}

// 受取完了エンドポイント
async fn complete_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .order_service
        .complete_order(OrderId::new(order_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderResponse::from_order(&order)))
}

// 注文キャンセルエンドポイント
async fn cancel_order(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .order_service
        .cancel_order(user_id, OrderId::new(order_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(OrderResponse::from_order(&order)))
}

// 注文の予約一覧取得エンドポイント
async fn get_order_reservations(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> ApiResult<Json<Vec<ReservationResponse>>> {
    let reservations = state
        .inventory_service
        .get_order_reservations(OrderId::new(order_id))
        .await
        .map_err(map_application_error)?;
    Ok(Json(
        reservations
            .iter()
            .map(ReservationResponse::from_reservation)
            .collect(),
    ))
}

// アプリケーションエラーをHTTPエラーにマッピング
fn map_application_error(err: ApplicationError) -> (StatusCode, Json<ApiError>) {
    match err {
        ApplicationError::DomainError(domain_err) => map_domain_error(domain_err),
        ApplicationError::NotFound(msg) => api_error(StatusCode::NOT_FOUND, "NOT_FOUND", msg),
        ApplicationError::AlreadyExists(msg) => {
            api_error(StatusCode::CONFLICT, "ALREADY_EXISTS", msg)
        }
        err @ ApplicationError::ConcurrentUpdate(_) => {
            api_error(StatusCode::CONFLICT, "CONCURRENT_UPDATE", err.to_string())
        }
        err @ ApplicationError::RetriesExhausted { .. } => {
            api_error(StatusCode::CONFLICT, "RETRIES_EXHAUSTED", err.to_string())
        }
        ApplicationError::RepositoryError(repo_err) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "REPOSITORY_ERROR",
            repo_err.to_string(),
        ),
    }
}

// ドメインエラーを適切なHTTPステータスコードとエラーコードにマッピング
fn map_domain_error(domain_err: DomainError) -> (StatusCode, Json<ApiError>) {
    let message = domain_err.to_string();
    match domain_err {
        DomainError::InsufficientStock { .. } => {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_STOCK", message)
        }
        DomainError::InvalidAdjustment { .. } => {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_ADJUSTMENT", message)
        }
        DomainError::InvalidStateTransition(_) => api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_STATE_TRANSITION",
            message,
        ),
        DomainError::InvalidQuantity(_) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_QUANTITY", message)
        }
        DomainError::InvalidValue(_) => api_error(StatusCode::BAD_REQUEST, "INVALID_VALUE", message),
    }
}


#[cfg(test)]
mod api_tests {
    use super::*;
    use crate::adapter::driven::{InMemoryStore, SystemClock, TracingLogger};
    use crate::application::{InventorySettings, OrderSettings};
    use crate::domain::model::Product;
    use axum::http::{HeaderName, HeaderValue};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    async fn server() -> TestServer {
        let store = InMemoryStore::new();
        store
            .add_product(Product {
                id: ProductId::new(1),
                name: "ノート".to_string(),
                price: Money::new(300).unwrap(),
                main_image: None,
            })
            .await;
        let clock = Arc::new(SystemClock);
        let logger = Arc::new(TracingLogger::new());
        let inventory_service = Arc::new(InventoryService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            clock.clone(),
            logger.clone(),
            InventorySettings::default(),
        ));
        let order_service = Arc::new(OrderService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            inventory_service.clone(),
            clock,
            logger,
            OrderSettings::default(),
        ));
        let app = create_router().with_state(AppState {
            inventory_service,
            order_service,
        });
        TestServer::new(app).unwrap()
    }

    fn user(id: &'static str) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static(USER_ID_HEADER),
            HeaderValue::from_static(id),
        )
    }

    #[tokio::test]
    async fn test_inventory_lifecycle() {
        let server = server().await;

        let response = server
            .post("/inventories")
            .json(&json!({"product_id": 1, "initial_stock": 10, "low_stock_threshold": 2}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);

        let response = server
            .post("/inventories")
            .json(&json!({"product_id": 1, "initial_stock": 10}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);

        let response = server
            .post("/inventories/1/reserve")
            .json(&json!({"order_id": 50, "quantity": 4}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["available_stock"], 6);
        assert_eq!(body["reserved_stock"], 4);

        let response = server
            .post("/inventories/1/reserve")
            .json(&json!({"order_id": 51, "quantity": 7}))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: ApiError = response.json();
        assert_eq!(body.code, "INSUFFICIENT_STOCK");

        let response = server.get("/inventories/1/availability?quantity=6").await;
        let body: Value = response.json();
        assert_eq!(body["is_available"], true);

        let response = server
            .post("/inventories/1/deduct")
            .json(&json!({"order_id": 50, "quantity": 4}))
            .await;
        let body: Value = response.json();
        assert_eq!(body["reserved_stock"], 0);
        assert_eq!(body["total_stock"], 6);

        let response = server
            .post("/inventories/1/restock")
            .add_header(
                HeaderName::from_static(OPERATOR_ID_HEADER),
                HeaderValue::from_static("9"),
            )
            .json(&json!({"quantity": 5}))
            .await;
        let body: Value = response.json();
        assert_eq!(body["available_stock"], 11);

        let response = server.get("/inventories/1/logs?page_size=2").await;
        let body: Value = response.json();
        assert_eq!(body["total"], 3);
        assert_eq!(body["total_pages"], 2);
        assert_eq!(body["items"][0]["change_type"], "restock");
        assert_eq!(body["items"][0]["operator_id"], 9);
    }

    #[tokio::test]
    async fn test_missing_inventory_is_not_found() {
        let server = server().await;
        let response = server.get("/inventories/404").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_restock_beyond_upper_limit_is_bad_request() {
        let server = server().await;
        server
            .post("/inventories")
            .json(&json!({"product_id": 1, "initial_stock": 10}))
            .await;

        let response = server
            .post("/inventories/1/restock")
            .json(&json!({"quantity": i32::MAX}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: ApiError = response.json();
        assert_eq!(body.code, "INVALID_VALUE");

        let response = server
            .post("/inventories/1/adjust")
            .json(&json!({"delta": i32::MAX, "reason": "棚卸"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

        let body: Value = server.get("/inventories/1").await.json();
        assert_eq!(body["available_stock"], 10);
    }

    #[tokio::test]
    async fn test_get_order_by_order_no() {
        let server = server().await;
        server
            .post("/inventories")
            .json(&json!({"product_id": 1, "initial_stock": 5}))
            .await;

        let (name, value) = user("7");
        let order: Value = server
            .post("/orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "items": [{"product_id": 1, "quantity": 1}],
                "receiver_name": "山田太郎",
                "receiver_phone": "090-0000-0000",
                "receiver_address": "東京都千代田区1-1"
            }))
            .await
            .json();
        let order_no = order["order_no"].as_str().unwrap().to_string();

        let response = server
            .get(&format!("/orders/order-no/{}", order_no))
            .add_header(name.clone(), value.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let found: Value = response.json();
        assert_eq!(found["id"], order["id"]);
        assert_eq!(found["order_no"], order_no.as_str());

        let (other_name, other_value) = user("8");
        let response = server
            .get(&format!("/orders/order-no/{}", order_no))
            .add_header(other_name, other_value)
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        let response = server
            .get("/orders/order-no/ORD00000000000000000")
            .add_header(name, value)
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_order_requires_user_header() {
        let server = server().await;
        let response = server
            .post("/orders")
            .json(&json!({
                "items": [{"product_id": 1, "quantity": 1}],
                "receiver_name": "山田太郎",
                "receiver_phone": "090-0000-0000",
                "receiver_address": "東京都千代田区1-1"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_order_flow() {
        let server = server().await;
        server
            .post("/inventories")
            .json(&json!({"product_id": 1, "initial_stock": 5}))
            .await;

        let (name, value) = user("7");
        let response = server
            .post("/orders")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "items": [
                    {"product_id": 1, "quantity": 1},
                    {"product_id": 1, "quantity": 1}
                ],
                "receiver_name": "山田太郎",
                "receiver_phone": "090-0000-0000",
                "receiver_address": "東京都千代田区1-1",
                "shipping_fee": 500
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let order: Value = response.json();
        assert_eq!(order["status"], "pending");
        assert_eq!(order["total_amount"], 600);
        assert_eq!(order["pay_amount"], 1100);
        assert_eq!(order["items"][0]["quantity"], 2);
        let order_id = order["id"].as_i64().unwrap();

        let response = server
            .get(&format!("/orders/{}/reservations", order_id))
            .await;
        let reservations: Value = response.json();
        assert_eq!(reservations[0]["status"], "active");

        let (other_name, other_value) = user("8");
        let response = server
            .get(&format!("/orders/{}", order_id))
            .add_header(other_name, other_value)
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        let response = server
            .post(&format!("/orders/{}/cancel", order_id))
            .add_header(name.clone(), value.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let order: Value = response.json();
        assert_eq!(order["status"], "cancelled");

        let response = server
            .post(&format!("/orders/{}/pay", order_id))
            .add_header(name.clone(), value.clone())
            .await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = server.get("/inventories/1").await;
        let body: Value = response.json();
        assert_eq!(body["available_stock"], 5);
        assert_eq!(body["reserved_stock"], 0);

        let response = server.get("/orders").add_header(name, value).await;
        let body: Value = response.json();
        assert_eq!(body["total"], 1);
    }
}
