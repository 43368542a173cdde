use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};

use std::fmt;

/// 数値IDの値オブジェクトを定義する
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// 数値からIDを作成
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// 内部の数値を取得
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// 商品の一意識別子
    ProductId
);

numeric_id!(
    /// 注文の一意識別子
    OrderId
);

numeric_id!(
    /// 利用者の一意識別子
    UserId
);

numeric_id!(
    /// 在庫操作を行った担当者の識別子
    OperatorId
);

/// 金額を表す値オブジェクト（最小通貨単位の整数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// 金額を作成
    /// 負の金額は受け付けない
    pub fn new(amount: i64) -> Result<Self, DomainError> {
        if amount < 0 {
            return Err(DomainError::InvalidValue(format!(
                "金額は0以上である必要があります: {}",
                amount
            )));
        }
        Ok(Self(amount))
    }

    /// 0円
    pub fn zero() -> Self {
        Self(0)
    }

    /// 金額を取得
    pub fn amount(&self) -> i64 {
        self.0
    }

    /// 加算
    /// 上限を超える場合は `InvalidValue`
    pub fn add(&self, other: Money) -> Result<Money, DomainError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| amount_overflow(self.0, other.0))
    }

    /// 減算（結果は負にもなりうるため生の値を返す）
    /// 両辺とも0以上なので桁あふれしない
    pub fn subtract(&self, other: Money) -> i64 {
        self.0 - other.0
    }

    /// 数量を乗算
    /// 上限を超える場合は `InvalidValue`
    pub fn multiply(&self, quantity: i32) -> Result<Money, DomainError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Money)
            .ok_or_else(|| amount_overflow(self.0, i64::from(quantity)))
    }
}

fn amount_overflow(lhs: i64, rhs: i64) -> DomainError {
    DomainError::InvalidValue(format!("金額が上限を超えます: {} と {}", lhs, rhs))
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 数量を検証する（1以上）
pub fn ensure_positive_quantity(quantity: i32) -> Result<i32, DomainError> {
    if quantity <= 0 {
        return Err(DomainError::InvalidQuantity(quantity));
    }
    Ok(quantity)
}
