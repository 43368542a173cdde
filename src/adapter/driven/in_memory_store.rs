use crate::domain::model::{
    InventoryLogEntry, InventoryRecord, Order, OrderDraft, OrderId, OrderStatus, Page,
    PageRequest, Product, ProductId, Reservation, ReservationStatus, UserId,
};
use crate::domain::port::{
    InventoryRepository, OrderRepository, ProductCatalog, RepositoryError, TransactionManager,
    UnitOfWork,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredInventory {
    record: InventoryRecord,
    deleted_at: Option<DateTime<Utc>>,
}

impl StoredInventory {
    fn live(&self) -> Option<&InventoryRecord> {
        match self.deleted_at {
            None => Some(&self.record),
            Some(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    inventories: BTreeMap<ProductId, StoredInventory>,
    reservations: BTreeMap<(ProductId, OrderId), Reservation>,
    logs: Vec<InventoryLogEntry>,
    orders: BTreeMap<OrderId, Order>,
    products: HashMap<ProductId, Product>,
    next_log_id: i64,
}

impl MemoryState {
    fn live_inventory_mut(&mut self, product_id: ProductId) -> Option<&mut InventoryRecord> {
        self.inventories
            .get_mut(&product_id)
            .filter(|stored| stored.deleted_at.is_none())
            .map(|stored| &mut stored.record)
    }
}

/// 作業単位の中で保留している書き込み
/// コミット時に最新のコミット済み状態へ順に適用し、条件を再検証する
#[derive(Debug, Clone)]
enum PendingWrite {
    UpdateInventory {
        next: InventoryRecord,
        expected_version: i64,
    },
    IncrementAvailable {
        product_id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    },
    InsertReservation(Reservation),
    UpdateReservationStatus {
        product_id: ProductId,
        order_id: OrderId,
        from: ReservationStatus,
        to: ReservationStatus,
        now: DateTime<Utc>,
    },
    AppendLog(InventoryLogEntry),
    InsertOrder(Order),
    UpdateOrderStatus {
        order: Order,
        from: OrderStatus,
    },
}

/// 書き込み対象の行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Inventory(ProductId),
    Reservation(ProductId, OrderId),
    Order(OrderId),
}

enum ApplyError {
    /// 条件付き更新の条件に一致しない
    GuardFailed(String),
    Repository(RepositoryError),
}

impl PendingWrite {
    fn row(&self) -> Option<RowKey> {
        match self {
            PendingWrite::UpdateInventory { next, .. } => {
                Some(RowKey::Inventory(next.product_id()))
            }
            PendingWrite::IncrementAvailable { product_id, .. } => {
                Some(RowKey::Inventory(*product_id))
            }
            PendingWrite::InsertReservation(r) => {
                Some(RowKey::Reservation(r.product_id(), r.order_id()))
            }
            PendingWrite::UpdateReservationStatus {
                product_id,
                order_id,
                ..
            } => Some(RowKey::Reservation(*product_id, *order_id)),
            PendingWrite::AppendLog(_) => None,
            PendingWrite::InsertOrder(order) => Some(RowKey::Order(order.id())),
            PendingWrite::UpdateOrderStatus { order, .. } => Some(RowKey::Order(order.id())),
        }
    }

    fn apply(&self, state: &mut MemoryState) -> Result<(), ApplyError> {
        match self {
            PendingWrite::UpdateInventory {
                next,
                expected_version,
            } => {
                let product_id = next.product_id();
                let record = state.live_inventory_mut(product_id).ok_or_else(|| {
                    ApplyError::GuardFailed(format!("商品 {} の在庫が存在しません", product_id))
                })?;
                if record.version() != *expected_version {
                    return Err(ApplyError::GuardFailed(format!(
                        "商品 {} の在庫のバージョン {} が期待値 {} と一致しません",
                        product_id,
                        record.version(),
                        expected_version
                    )));
                }
                *record = next.clone();
                Ok(())
            }
            PendingWrite::IncrementAvailable {
                product_id,
                quantity,
                now,
            } => {
                let record = state.live_inventory_mut(*product_id).ok_or_else(|| {
                    ApplyError::GuardFailed(format!("商品 {} の在庫が存在しません", product_id))
                })?;
                *record = record.restock(*quantity, *now).map_err(|e| {
                    ApplyError::Repository(RepositoryError::OperationFailed(e.to_string()))
                })?;
                Ok(())
            }
            PendingWrite::InsertReservation(reservation) => {
                let key = (reservation.product_id(), reservation.order_id());
                if state.reservations.contains_key(&key) {
                    return Err(ApplyError::Repository(RepositoryError::UniqueViolation(
                        format!(
                            "商品 {} の注文 {} に対する予約は既に存在します",
                            key.0, key.1
                        ),
                    )));
                }
                state.reservations.insert(key, reservation.clone());
                Ok(())
            }
            PendingWrite::UpdateReservationStatus {
                product_id,
                order_id,
                from,
                to,
                now,
            } => {
                let reservation = state
                    .reservations
                    .get_mut(&(*product_id, *order_id))
                    .filter(|r| r.status() == *from)
                    .ok_or_else(|| {
                        ApplyError::GuardFailed(format!(
                            "予約 ({}, {}) は {} ではありません",
                            product_id, order_id, from
                        ))
                    })?;
                *reservation = reservation.transition_to(*to, *now).map_err(|e| {
                    ApplyError::Repository(RepositoryError::OperationFailed(e.to_string()))
                })?;
                Ok(())
            }
            PendingWrite::AppendLog(entry) => {
                state.next_log_id += 1;
                let id = state.next_log_id;
                state.logs.push(entry.clone().with_id(id));
                Ok(())
            }
            PendingWrite::InsertOrder(order) => {
                state.orders.insert(order.id(), order.clone());
                Ok(())
            }
            PendingWrite::UpdateOrderStatus { order, from } => {
                let stored = state
                    .orders
                    .get_mut(&order.id())
                    .filter(|o| o.status() == *from)
                    .ok_or_else(|| {
                        ApplyError::GuardFailed(format!("注文 {} は {} ではありません", order.id(), from))
                    })?;
                *stored = order.clone();
                Ok(())
            }
        }
    }
}

/// 行をコミット済み状態の最新値で置き換える
/// 更新文が常に最新のコミット済み行に対して評価されることを再現する
fn refresh_row(working: &mut MemoryState, committed: &MemoryState, row: RowKey) {
    match row {
        RowKey::Inventory(product_id) => match committed.inventories.get(&product_id) {
            Some(stored) => {
                working.inventories.insert(product_id, stored.clone());
            }
            None => {
                working.inventories.remove(&product_id);
            }
        },
        RowKey::Reservation(product_id, order_id) => {
            let key = (product_id, order_id);
            match committed.reservations.get(&key) {
                Some(r) => {
                    working.reservations.insert(key, r.clone());
                }
                None => {
                    working.reservations.remove(&key);
                }
            }
        }
        RowKey::Order(order_id) => {
            if let Some(order) = committed.orders.get(&order_id) {
                working.orders.insert(order_id, order.clone());
            }
        }
    }
}

/// インメモリストア
///
/// すべてのポートを1つの共有状態で実装する。テストとローカル実行用。
/// 作業単位は開始時点のスナップショットを読み、書き込みはコミットまで保留する。
/// コミット時には保留中の書き込みを最新の状態へ適用し直し、
/// 条件付き更新の条件が崩れていれば `RepositoryError::Conflict` で失敗する。
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    next_order_id: Arc<AtomicI64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            next_order_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// 商品カタログに商品を登録する
    pub async fn add_product(&self, product: Product) {
        let mut state = self.state.lock().await;
        state.products.insert(product.id, product);
    }

    /// すべての在庫レコードの利用可能数と予約数が0以上かどうか
    pub async fn is_consistent(&self) -> bool {
        let state = self.state.lock().await;
        state
            .inventories
            .values()
            .all(|stored| stored.record.available() >= 0 && stored.record.reserved() >= 0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// インメモリストアの作業単位
pub struct InMemoryUnitOfWork {
    store: InMemoryStore,
    working: MemoryState,
    written: HashSet<RowKey>,
    pending: Vec<PendingWrite>,
}

impl InMemoryUnitOfWork {
    /// 書き込みを作業コピーへ適用して保留する
    ///
    /// # Returns
    /// * `Ok(false)` - 条件に一致する行がない
    async fn stage(&mut self, write: PendingWrite) -> Result<bool, RepositoryError> {
        if let Some(row) = write.row() {
            if !self.written.contains(&row) {
                let committed = self.store.state.lock().await;
                refresh_row(&mut self.working, &committed, row);
            }
        }

        match write.apply(&mut self.working) {
            Ok(()) => {
                if let Some(row) = write.row() {
                    self.written.insert(row);
                }
                self.pending.push(write);
                Ok(true)
            }
            Err(ApplyError::GuardFailed(_)) => Ok(false),
            Err(ApplyError::Repository(err)) => Err(err),
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_inventory(
        &mut self,
        product_id: ProductId,
    ) -> Result<Option<InventoryRecord>, RepositoryError> {
        Ok(self
            .working
            .inventories
            .get(&product_id)
            .and_then(StoredInventory::live)
            .cloned())
    }

    async fn update_inventory_if_version(
        &mut self,
        next: &InventoryRecord,
        expected_version: i64,
    ) -> Result<bool, RepositoryError> {
        self.stage(PendingWrite::UpdateInventory {
            next: next.clone(),
            expected_version,
        })
        .await
    }

    async fn increment_available(
        &mut self,
        product_id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.stage(PendingWrite::IncrementAvailable {
            product_id,
            quantity,
            now,
        })
        .await
    }

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
    ) -> Result<(), RepositoryError> {
        self.stage(PendingWrite::InsertReservation(reservation.clone()))
            .await
            .map(|_| ())
    }

    async fn find_reservation(
        &mut self,
        product_id: ProductId,
        order_id: OrderId,
    ) -> Result<Option<Reservation>, RepositoryError> {
        Ok(self
            .working
            .reservations
            .get(&(product_id, order_id))
            .cloned())
    }

    async fn update_reservation_status(
        &mut self,
        product_id: ProductId,
        order_id: OrderId,
        from: ReservationStatus,
        to: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.stage(PendingWrite::UpdateReservationStatus {
            product_id,
            order_id,
            from,
            to,
            now,
        })
        .await
    }

    async fn append_inventory_log(
        &mut self,
        entry: &InventoryLogEntry,
    ) -> Result<(), RepositoryError> {
        self.stage(PendingWrite::AppendLog(entry.clone()))
            .await
            .map(|_| ())
    }

    async fn insert_order(&mut self, draft: &OrderDraft) -> Result<Order, RepositoryError> {
        let id = self.store.next_order_id.fetch_add(1, Ordering::SeqCst);
        let order = draft.clone().into_order(OrderId::new(id));
        self.stage(PendingWrite::InsertOrder(order.clone())).await?;
        Ok(order)
    }

    async fn find_order(&mut self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn update_order_status(
        &mut self,
        order: &Order,
        from: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        self.stage(PendingWrite::UpdateOrderStatus {
            order: order.clone(),
            from,
        })
        .await
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let mut committed = self.store.state.lock().await;
        let mut next = committed.clone();
        for write in &self.pending {
            match write.apply(&mut next) {
                Ok(()) => {}
                Err(ApplyError::GuardFailed(reason)) => {
                    return Err(RepositoryError::Conflict(reason));
                }
                Err(ApplyError::Repository(err)) => return Err(err),
            }
        }
        *committed = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let snapshot = self.state.lock().await.clone();
        Ok(Box::new(InMemoryUnitOfWork {
            store: self.clone(),
            working: snapshot,
            written: HashSet::new(),
            pending: Vec::new(),
        }))
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    Page::new(items, total, page)
}

#[async_trait]
impl InventoryRepository for InMemoryStore {
    async fn create(&self, record: &InventoryRecord) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if state.inventories.contains_key(&record.product_id()) {
            return Err(RepositoryError::UniqueViolation(format!(
                "商品 {} の在庫は既に存在します",
                record.product_id()
            )));
        }
        state.inventories.insert(
            record.product_id(),
            StoredInventory {
                record: record.clone(),
                deleted_at: None,
            },
        );
        Ok(())
    }

    async fn find_by_product_id(
        &self,
        product_id: ProductId,
    ) -> Result<Option<InventoryRecord>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .inventories
            .get(&product_id)
            .and_then(StoredInventory::live)
            .cloned())
    }

    async fn list(&self, page: PageRequest) -> Result<Page<InventoryRecord>, RepositoryError> {
        let state = self.state.lock().await;
        let records: Vec<_> = state
            .inventories
            .values()
            .filter_map(StoredInventory::live)
            .cloned()
            .collect();
        Ok(paginate(records, page))
    }

    async fn list_low_stock(
        &self,
        page: PageRequest,
    ) -> Result<Page<InventoryRecord>, RepositoryError> {
        let state = self.state.lock().await;
        let mut records: Vec<_> = state
            .inventories
            .values()
            .filter_map(StoredInventory::live)
            .filter(|record| record.is_low_stock())
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.available(), record.product_id()));
        Ok(paginate(records, page))
    }

    async fn update_low_stock_threshold(
        &self,
        product_id: ProductId,
        threshold: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(record) = state.live_inventory_mut(product_id) else {
            return Ok(false);
        };
        *record = record
            .with_low_stock_threshold(threshold, now)
            .map_err(|e| RepositoryError::OperationFailed(e.to_string()))?;
        Ok(true)
    }

    async fn soft_delete(
        &self,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        match state.inventories.get_mut(&product_id) {
            Some(stored) if stored.deleted_at.is_none() => {
                stored.deleted_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_logs_by_product(
        &self,
        product_id: ProductId,
        page: PageRequest,
    ) -> Result<Page<InventoryLogEntry>, RepositoryError> {
        let state = self.state.lock().await;
        let logs: Vec<_> = state
            .logs
            .iter()
            .rev()
            .filter(|entry| entry.product_id() == product_id)
            .cloned()
            .collect();
        Ok(paginate(logs, page))
    }

    async fn find_expired_reservations(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let state = self.state.lock().await;
        let mut expired: Vec<_> = state
            .reservations
            .values()
            .filter(|r| r.is_expired_at(now))
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.expires_at());
        expired.truncate(limit as usize);
        Ok(expired)
    }

    async fn find_reservations_by_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<Reservation>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.order_id() == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .find(|order| order.details().order_no() == order_no)
            .cloned())
    }

    async fn find_by_user(
        &self,
        user_id: UserId,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|order| order.is_owned_by(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.details()
                .created_at()
                .cmp(&a.details().created_at())
                .then(b.id().cmp(&a.id()))
        });
        Ok(paginate(orders, page))
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn get_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}
