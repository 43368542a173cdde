// ドメインモデル（エンティティと値オブジェクト）

mod inventory;
mod inventory_log;
mod order;
mod page;
mod product;
mod reservation;
mod value_objects;

pub use value_objects::{ensure_positive_quantity, Money, OperatorId, OrderId, ProductId, UserId};

pub use inventory::{InventoryRecord, StockSnapshot};
pub use inventory_log::{ChangeType, InventoryLogEntry};
pub use order::{
    generate_order_no, Order, OrderDraft, OrderItem, OrderLine, OrderStatus, OrderTimeline,
    Receiver,
};
pub use page::{Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use product::Product;
pub use reservation::{ReleaseTarget, Reservation, ReservationStatus};
