use stock_reservation_service::adapter::driven::{
    InMemoryStore, MySqlInventoryRepository, MySqlOrderRepository, MySqlProductCatalog,
    MySqlTransactionManager, SystemClock, TracingLogger,
};
use stock_reservation_service::adapter::driver::{create_router, AppState};
use stock_reservation_service::adapter::{AppConfig, DatabaseMigration, StoreBackend};
use stock_reservation_service::application::service::{
    ExpiryReaper, InventoryService, OrderService,
};
use stock_reservation_service::domain::port::{
    Clock, InventoryRepository, Logger, OrderRepository, ProductCatalog, TransactionManager,
};

use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

/// 永続化アダプター一式
struct Ports {
    transactions: Arc<dyn TransactionManager>,
    inventories: Arc<dyn InventoryRepository>,
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn ProductCatalog>,
}

async fn build_ports(config: &AppConfig) -> Result<Ports, Box<dyn std::error::Error>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("インメモリストアで起動します（データは保存されません）");
            let store = InMemoryStore::new();
            Ok(Ports {
                transactions: Arc::new(store.clone()),
                inventories: Arc::new(store.clone()),
                orders: Arc::new(store.clone()),
                catalog: Arc::new(store),
            })
        }
        StoreBackend::MySql => {
            let db = &config.database;
            tracing::info!(host = %db.host, port = db.port, "データベースに接続します");

            // 接続プールを作成
            let pool = MySqlPoolOptions::new()
                .max_connections(db.max_connections)
                .connect(&db.connection_string())
                .await?;

            // マイグレーションを実行
            DatabaseMigration::new(pool.clone()).run().await?;

            Ok(Ports {
                transactions: Arc::new(MySqlTransactionManager::new(pool.clone())),
                inventories: Arc::new(MySqlInventoryRepository::new(pool.clone())),
                orders: Arc::new(MySqlOrderRepository::new(pool.clone())),
                catalog: Arc::new(MySqlProductCatalog::new(pool)),
            })
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "停止シグナルの待機に失敗しました");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stock_reservation_service=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(backend = ?config.store_backend, "設定を読み込みました");

    let ports = build_ports(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new());

    let inventory_service = Arc::new(InventoryService::new(
        ports.transactions.clone(),
        ports.inventories,
        clock.clone(),
        logger.clone(),
        config.inventory.clone(),
    ));
    let order_service = Arc::new(OrderService::new(
        ports.transactions,
        ports.orders,
        ports.catalog,
        inventory_service.clone(),
        clock,
        logger.clone(),
        config.order.clone(),
    ));

    // 期限切れ予約の定期回収を開始
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper = Arc::new(ExpiryReaper::new(inventory_service.clone(), logger));
    let reaper_handle = reaper.spawn(shutdown_rx);

    // REST APIルーターを作成
    let app = create_router()
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(AppState {
            inventory_service,
            order_service,
        });

    // サーバーを起動
    let listener = tokio::net::TcpListener::bind(&config.server_bind_address).await?;
    tracing::info!(address = %config.server_bind_address, "REST APIサーバーが起動しました");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 回収タスクを停止して終了を待つ
    shutdown_tx.send(true).ok();
    if let Err(err) = reaper_handle.await {
        tracing::error!(error = %err, "期限切れ予約の回収タスクが異常終了しました");
    }
    tracing::info!("サーバーを停止しました");

    Ok(())
}
