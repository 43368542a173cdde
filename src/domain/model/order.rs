use crate::domain::error::DomainError;
use crate::domain::model::value_objects::ensure_positive_quantity;
use crate::domain::model::{Money, OrderId, Product, ProductId, UserId};
use chrono::{DateTime, Utc};
use std::fmt;

/// 注文のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// 支払い待ち（在庫予約済み）
    Pending,
    /// 支払い済み（在庫出庫確定済み）
    Paid,
    /// 発送済み
    Shipped,
    /// 完了
    Completed,
    /// キャンセル済み
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// 文字列からOrderStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な注文ステータス: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 受取人情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receiver {
    name: String,
    phone: String,
    address: String,
    zip_code: Option<String>,
}

impl Receiver {
    /// 受取人情報を作成
    /// 氏名・電話番号・住所は必須、郵便番号は任意
    pub fn new(
        name: String,
        phone: String,
        address: String,
        zip_code: Option<String>,
    ) -> Result<Self, DomainError> {
        Self::ensure_length("受取人氏名", &name, 50)?;
        Self::ensure_length("電話番号", &phone, 20)?;
        Self::ensure_length("住所", &address, 500)?;
        let zip_code = zip_code.filter(|z| !z.trim().is_empty());
        if let Some(zip) = &zip_code {
            Self::ensure_length("郵便番号", zip, 20)?;
        }
        Ok(Self {
            name,
            phone,
            address,
            zip_code,
        })
    }

    fn ensure_length(field: &str, value: &str, max: usize) -> Result<(), DomainError> {
        let len = value.trim().chars().count();
        if len == 0 {
            return Err(DomainError::InvalidValue(format!("{}は必須です", field)));
        }
        if len > max {
            return Err(DomainError::InvalidValue(format!(
                "{}は{}文字以内で入力してください",
                field, max
            )));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn zip_code(&self) -> Option<&str> {
        self.zip_code.as_deref()
    }
}

/// 注文の要求明細（商品と数量）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl OrderLine {
    /// 同じ商品の明細を1行にまとめる
    /// 最初に現れた順序を保ち、数量は合算する
    pub fn merge(lines: &[OrderLine]) -> Result<Vec<OrderLine>, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::InvalidValue(
                "注文明細が空です".to_string(),
            ));
        }
        let mut merged: Vec<OrderLine> = Vec::with_capacity(lines.len());
        for line in lines {
            ensure_positive_quantity(line.quantity)?;
            if let Some(existing) = merged
                .iter_mut()
                .find(|m| m.product_id == line.product_id)
            {
                existing.quantity =
                    existing.quantity.checked_add(line.quantity).ok_or_else(|| {
                        DomainError::InvalidValue(format!(
                            "商品 {} の数量の合計が上限を超えます",
                            line.product_id
                        ))
                    })?;
            } else {
                merged.push(*line);
            }
        }
        Ok(merged)
    }
}

/// 注文明細（作成時点の商品情報を保持する）
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    product_id: ProductId,
    product_name: String,
    product_image: Option<String>,
    quantity: i32,
    unit_price: Money,
    total_price: Money,
}

impl OrderItem {
    /// 商品情報と数量から注文明細を作成
    pub fn from_product(product: &Product, quantity: i32) -> Result<Self, DomainError> {
        ensure_positive_quantity(quantity)?;
        Ok(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            product_image: product.main_image.clone(),
            quantity,
            unit_price: product.price,
            total_price: product.price.multiply(quantity)?,
        })
    }

    /// データベースから取得したデータで注文明細を再構築
    pub fn reconstruct(
        product_id: ProductId,
        product_name: String,
        product_image: Option<String>,
        quantity: i32,
        unit_price: Money,
        total_price: Money,
    ) -> Self {
        Self {
            product_id,
            product_name,
            product_image,
            quantity,
            unit_price,
            total_price,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn product_image(&self) -> Option<&str> {
        self.product_image.as_deref()
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }
}

/// 注文番号を生成する
/// 形式: ORD + YYYYMMDDHHMMSS + 3桁の端数
pub fn generate_order_no(now: DateTime<Utc>) -> String {
    format!(
        "ORD{}{:03}",
        now.format("%Y%m%d%H%M%S"),
        now.timestamp_subsec_nanos() % 1000
    )
}

/// 保存前の注文
/// 金額の計算はここで行い、IDは保存時に採番される
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    order_no: String,
    user_id: UserId,
    items: Vec<OrderItem>,
    total_amount: Money,
    discount_amount: Money,
    shipping_fee: Money,
    pay_amount: Money,
    receiver: Receiver,
    remark: Option<String>,
    created_at: DateTime<Utc>,
}

impl OrderDraft {
    /// 注文明細から保存前の注文を作成
    ///
    /// 支払金額 = 商品合計 - 割引額 + 送料
    ///
    /// # Returns
    /// * `Err(DomainError::InvalidValue)` - 明細が空、または支払金額が負
    pub fn new(
        user_id: UserId,
        items: Vec<OrderItem>,
        receiver: Receiver,
        discount_amount: Money,
        shipping_fee: Money,
        remark: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::InvalidValue(
                "注文明細が空です".to_string(),
            ));
        }
        let total_amount = items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.add(item.total_price()))?;
        let pay_amount = total_amount.add(shipping_fee)?.subtract(discount_amount);
        let pay_amount = Money::new(pay_amount).map_err(|_| {
            DomainError::InvalidValue(format!(
                "割引額 {} が支払金額を超えています",
                discount_amount
            ))
        })?;

        Ok(Self {
            order_no: generate_order_no(now),
            user_id,
            items,
            total_amount,
            discount_amount,
            shipping_fee,
            pay_amount,
            receiver,
            remark: remark.filter(|r| !r.trim().is_empty()),
            created_at: now,
        })
    }

    /// データベースから取得したデータで注文内容を再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        order_no: String,
        user_id: UserId,
        items: Vec<OrderItem>,
        total_amount: Money,
        discount_amount: Money,
        shipping_fee: Money,
        pay_amount: Money,
        receiver: Receiver,
        remark: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_no,
            user_id,
            items,
            total_amount,
            discount_amount,
            shipping_fee,
            pay_amount,
            receiver,
            remark,
            created_at,
        }
    }

    pub fn order_no(&self) -> &str {
        &self.order_no
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn shipping_fee(&self) -> Money {
        self.shipping_fee
    }

    pub fn pay_amount(&self) -> Money {
        self.pay_amount
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn remark(&self) -> Option<&str> {
        self.remark.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 採番されたIDで注文を確定させる
    pub fn into_order(self, id: OrderId) -> Order {
        let created_at = self.created_at;
        Order {
            id,
            draft: self,
            status: OrderStatus::Pending,
            timeline: OrderTimeline {
                updated_at: created_at,
                ..OrderTimeline::default()
            },
        }
    }
}

/// 注文ステータスの変更日時
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderTimeline {
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// 注文
/// 状態は pending → paid → shipped → completed、または pending → cancelled と進む
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: OrderId,
    draft: OrderDraft,
    status: OrderStatus,
    timeline: OrderTimeline,
}

impl Order {
    /// データベースから取得したデータで注文を再構築
    pub fn reconstruct(
        id: OrderId,
        draft: OrderDraft,
        status: OrderStatus,
        timeline: OrderTimeline,
    ) -> Self {
        Self {
            id,
            draft,
            status,
            timeline,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn timeline(&self) -> &OrderTimeline {
        &self.timeline
    }

    /// 金額・明細など作成時の内容
    pub fn details(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn user_id(&self) -> UserId {
        self.draft.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.draft.items
    }

    /// 指定された利用者の注文かどうか
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.draft.user_id == user_id
    }

    /// 支払い済みにする
    /// 事前条件: ステータスがPending
    pub fn pay(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(OrderStatus::Pending, OrderStatus::Paid, now)?;
        self.timeline.paid_at = Some(now);
        Ok(())
    }

    /// 発送済みにする
    /// 事前条件: ステータスがPaid
    pub fn ship(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(OrderStatus::Paid, OrderStatus::Shipped, now)?;
        self.timeline.shipped_at = Some(now);
        Ok(())
    }

    /// 完了にする
    /// 事前条件: ステータスがShipped
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(OrderStatus::Shipped, OrderStatus::Completed, now)?;
        self.timeline.completed_at = Some(now);
        Ok(())
    }

    /// キャンセルする
    /// 事前条件: ステータスがPending（支払い後のキャンセルは返金処理の対象外）
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Pending => {}
            OrderStatus::Completed | OrderStatus::Cancelled => {
                return Err(DomainError::InvalidStateTransition(format!(
                    "注文 {} は {} のためキャンセルできません",
                    self.id, self.status
                )));
            }
            OrderStatus::Paid | OrderStatus::Shipped => {
                return Err(DomainError::InvalidStateTransition(format!(
                    "注文 {} は支払い済みのためキャンセルできません",
                    self.id
                )));
            }
        }
        self.status = OrderStatus::Cancelled;
        self.timeline.cancelled_at = Some(now);
        self.timeline.updated_at = now;
        Ok(())
    }

    fn transition(
        &mut self,
        expected: OrderStatus,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::InvalidStateTransition(format!(
                "注文 {} を {} から {} へ遷移できません",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.timeline.updated_at = now;
        Ok(())
    }
}
