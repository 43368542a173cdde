use crate::domain::error::DomainError;
use crate::domain::model::value_objects::ensure_positive_quantity;
use crate::domain::model::ProductId;
use chrono::{DateTime, Utc};

/// 在庫数のスナップショット（監査ログの変更前後に使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockSnapshot {
    pub available: i32,
    pub reserved: i32,
}

/// 在庫台帳のレコード
/// 商品ごとに1件存在し、利用可能数・予約数・バージョンを保持する
///
/// 状態遷移メソッドは自身を変更せず、バージョンを1つ進めた次の状態を返す。
/// 永続化側は読み込み時のバージョンを条件に書き込むことで競合を検出する。
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRecord {
    product_id: ProductId,
    available: i32,
    reserved: i32,
    low_stock_threshold: i32,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// 新しい在庫レコードを作成
    ///
    /// # Arguments
    /// * `product_id` - 商品ID
    /// * `initial_stock` - 初期在庫数（0以上）
    /// * `low_stock_threshold` - 在庫僅少と判定するしきい値（0以上）
    /// * `now` - 作成日時
    pub fn new(
        product_id: ProductId,
        initial_stock: i32,
        low_stock_threshold: i32,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if initial_stock < 0 {
            return Err(DomainError::InvalidQuantity(initial_stock));
        }
        if low_stock_threshold < 0 {
            return Err(DomainError::InvalidValue(format!(
                "しきい値は0以上である必要があります: {}",
                low_stock_threshold
            )));
        }
        Ok(Self {
            product_id,
            available: initial_stock,
            reserved: 0,
            low_stock_threshold,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// データベースから取得したデータで在庫レコードを再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        product_id: ProductId,
        available: i32,
        reserved: i32,
        low_stock_threshold: i32,
        version: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            available,
            reserved,
            low_stock_threshold,
            version,
            created_at,
            updated_at,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn available(&self) -> i32 {
        self.available
    }

    pub fn reserved(&self) -> i32 {
        self.reserved
    }

    pub fn low_stock_threshold(&self) -> i32 {
        self.low_stock_threshold
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 総在庫数（利用可能数 + 予約数）
    pub fn total(&self) -> i32 {
        self.available.saturating_add(self.reserved)
    }

    /// 在庫僅少かどうか
    pub fn is_low_stock(&self) -> bool {
        self.available <= self.low_stock_threshold
    }

    /// 指定された数量が利用可能かチェック
    pub fn has_available_stock(&self, quantity: i32) -> bool {
        self.available >= quantity
    }

    /// 現在の在庫数のスナップショット
    pub fn snapshot(&self) -> StockSnapshot {
        StockSnapshot {
            available: self.available,
            reserved: self.reserved,
        }
    }

    /// 在庫を予約した次の状態を返す
    ///
    /// # Returns
    /// * `Ok(InventoryRecord)` - 利用可能数を減らし予約数を増やした状態
    /// * `Err(DomainError::InsufficientStock)` - 利用可能数が不足
    /// * `Err(DomainError::InvalidValue)` - 予約数が上限を超える
    pub fn reserve(&self, quantity: i32, now: DateTime<Utc>) -> Result<Self, DomainError> {
        ensure_positive_quantity(quantity)?;
        if !self.has_available_stock(quantity) {
            return Err(DomainError::InsufficientStock {
                product_id: self.product_id,
                available: self.available,
                requested: quantity,
            });
        }
        let (available, reserved) = self.checked_counts(
            Some(self.available - quantity),
            self.reserved.checked_add(quantity),
        )?;
        Ok(self.next(available, reserved, now))
    }

    /// 予約を解放した次の状態を返す
    pub fn release(&self, quantity: i32, now: DateTime<Utc>) -> Result<Self, DomainError> {
        ensure_positive_quantity(quantity)?;
        self.ensure_reserved_covers(quantity)?;
        let (available, reserved) = self.checked_counts(
            self.available.checked_add(quantity),
            Some(self.reserved - quantity),
        )?;
        Ok(self.next(available, reserved, now))
    }

    /// 予約分を出庫確定した次の状態を返す（利用可能数は変わらない）
    pub fn deduct(&self, quantity: i32, now: DateTime<Utc>) -> Result<Self, DomainError> {
        ensure_positive_quantity(quantity)?;
        self.ensure_reserved_covers(quantity)?;
        Ok(self.next(self.available, self.reserved - quantity, now))
    }

    /// 入荷した次の状態を返す
    ///
    /// # Returns
    /// * `Err(DomainError::InvalidValue)` - 在庫数が上限を超える
    pub fn restock(&self, quantity: i32, now: DateTime<Utc>) -> Result<Self, DomainError> {
        ensure_positive_quantity(quantity)?;
        let (available, reserved) =
            self.checked_counts(self.available.checked_add(quantity), Some(self.reserved))?;
        Ok(self.next(available, reserved, now))
    }

    /// 利用可能数を差分で調整した次の状態を返す
    ///
    /// # Returns
    /// * `Err(DomainError::InvalidQuantity)` - 差分が0
    /// * `Err(DomainError::InvalidAdjustment)` - 調整後の利用可能数が負
    /// * `Err(DomainError::InvalidValue)` - 在庫数が上限を超える
    pub fn adjust(&self, delta: i32, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if delta == 0 {
            return Err(DomainError::InvalidQuantity(delta));
        }
        let (new_available, reserved) =
            self.checked_counts(self.available.checked_add(delta), Some(self.reserved))?;
        if new_available < 0 {
            return Err(DomainError::InvalidAdjustment {
                product_id: self.product_id,
                available: self.available,
                delta,
            });
        }
        Ok(self.next(new_available, reserved, now))
    }

    /// 在庫僅少しきい値を変更した状態を返す（在庫数とバージョンは変わらない）
    pub fn with_low_stock_threshold(
        &self,
        threshold: i32,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if threshold < 0 {
            return Err(DomainError::InvalidValue(format!(
                "しきい値は0以上である必要があります: {}",
                threshold
            )));
        }
        Ok(Self {
            low_stock_threshold: threshold,
            updated_at: now,
            ..self.clone()
        })
    }

    fn ensure_reserved_covers(&self, quantity: i32) -> Result<(), DomainError> {
        if self.reserved < quantity {
            return Err(DomainError::InvalidStateTransition(format!(
                "商品 {} の予約数 {} を超える数量 {} は処理できません",
                self.product_id, self.reserved, quantity
            )));
        }
        Ok(())
    }

    /// 変更後の利用可能数・予約数とその合計が `i32` に収まることを検証する
    fn checked_counts(
        &self,
        available: Option<i32>,
        reserved: Option<i32>,
    ) -> Result<(i32, i32), DomainError> {
        match (available, reserved) {
            (Some(available), Some(reserved)) if available.checked_add(reserved).is_some() => {
                Ok((available, reserved))
            }
            _ => Err(DomainError::InvalidValue(format!(
                "商品 {} の在庫数が上限 {} を超えます",
                self.product_id,
                i32::MAX
            ))),
        }
    }

    fn next(&self, available: i32, reserved: i32, now: DateTime<Utc>) -> Self {
        Self {
            available,
            reserved,
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        }
    }
}
