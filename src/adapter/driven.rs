// 駆動される側アダプター（リポジトリ実装など）

mod clock;
mod in_memory_store;
mod inventory_repository;
mod mysql_unit_of_work;
mod order_repository;
mod product_catalog;
mod row_mapper;
mod tracing_logger;

pub use clock::{ManualClock, SystemClock};
pub use in_memory_store::{InMemoryStore, InMemoryUnitOfWork};
pub use inventory_repository::MySqlInventoryRepository;
pub use mysql_unit_of_work::{MySqlTransactionManager, MySqlUnitOfWork};
pub use order_repository::MySqlOrderRepository;
pub use product_catalog::MySqlProductCatalog;
pub use tracing_logger::TracingLogger;
