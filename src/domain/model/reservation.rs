use crate::domain::error::DomainError;
use crate::domain::model::value_objects::ensure_positive_quantity;
use crate::domain::model::{OrderId, ProductId};
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// 在庫予約のステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationStatus {
    /// 有効（在庫を確保中）
    Active,
    /// 確定（支払い済みで出庫確定）
    Confirmed,
    /// キャンセル
    Cancelled,
    /// 期限切れ
    Expired,
}

impl ReservationStatus {
    /// 永続化用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "active",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }

    /// 文字列からReservationStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "active" => Ok(ReservationStatus::Active),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "expired" => Ok(ReservationStatus::Expired),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な予約ステータス: {}",
                s
            ))),
        }
    }

    /// 終端状態かどうか（終端状態からは遷移できない）
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }

    /// 指定されたステータスへ遷移できるか
    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (
                ReservationStatus::Active,
                ReservationStatus::Confirmed
                    | ReservationStatus::Cancelled
                    | ReservationStatus::Expired
            )
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 予約解放後のステータス
/// キャンセルによる解放と期限切れによる解放を区別する
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseTarget {
    Cancelled,
    Expired,
}

impl ReleaseTarget {
    pub fn status(&self) -> ReservationStatus {
        match self {
            ReleaseTarget::Cancelled => ReservationStatus::Cancelled,
            ReleaseTarget::Expired => ReservationStatus::Expired,
        }
    }

    /// 監査ログに記録する理由
    pub fn reason(&self) -> &'static str {
        match self {
            ReleaseTarget::Cancelled => "Stock released from cancelled order",
            ReleaseTarget::Expired => "Stock released from expired reservation",
        }
    }
}

/// 在庫予約
/// 注文と商品の組に対して一定期間在庫を確保する
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    product_id: ProductId,
    order_id: OrderId,
    quantity: i32,
    status: ReservationStatus,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Reservation {
    /// 新しい有効な予約を作成
    ///
    /// # Arguments
    /// * `product_id` - 商品ID
    /// * `order_id` - 注文ID
    /// * `quantity` - 予約数量（1以上）
    /// * `ttl` - 有効期間
    /// * `now` - 作成日時
    pub fn new(
        product_id: ProductId,
        order_id: OrderId,
        quantity: i32,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        ensure_positive_quantity(quantity)?;
        Ok(Self {
            product_id,
            order_id,
            quantity,
            status: ReservationStatus::Active,
            expires_at: now + ttl,
            created_at: now,
            updated_at: now,
        })
    }

    /// データベースから取得したデータで予約を再構築
    pub fn reconstruct(
        product_id: ProductId,
        order_id: OrderId,
        quantity: i32,
        status: ReservationStatus,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            order_id,
            quantity,
            status,
            expires_at,
            created_at,
            updated_at,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 有効期限を過ぎた有効な予約かどうか
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Active && self.expires_at < now
    }

    /// 解放・出庫確定の事前条件を検証する
    /// 予約が有効で、かつ数量が一致していること
    pub fn ensure_settleable(&self, quantity: i32) -> Result<(), DomainError> {
        if self.status != ReservationStatus::Active {
            return Err(DomainError::InvalidStateTransition(format!(
                "予約 (商品 {}, 注文 {}) は {} 状態のため処理できません",
                self.product_id, self.order_id, self.status
            )));
        }
        if self.quantity != quantity {
            return Err(DomainError::InvalidValue(format!(
                "予約数量 {} と要求数量 {} が一致しません",
                self.quantity, quantity
            )));
        }
        Ok(())
    }

    /// 指定されたステータスへ遷移した予約を返す
    pub fn transition_to(
        &self,
        next: ReservationStatus,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition(format!(
                "予約を {} から {} へ遷移できません",
                self.status, next
            )));
        }
        Ok(Self {
            status: next,
            updated_at: now,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> Reservation {
        Reservation::new(
            ProductId::new(1),
            OrderId::new(100),
            4,
            Duration::minutes(30),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_reservation_is_active_with_expiry() {
        let now = Utc::now();
        let reservation =
            Reservation::new(ProductId::new(1), OrderId::new(100), 4, Duration::minutes(30), now)
                .unwrap();
        assert_eq!(reservation.status(), ReservationStatus::Active);
        assert_eq!(reservation.expires_at(), now + Duration::minutes(30));
    }

    #[test]
    fn test_new_reservation_rejects_zero_quantity() {
        let result =
            Reservation::new(ProductId::new(1), OrderId::new(1), 0, Duration::minutes(1), Utc::now());
        assert_eq!(result.unwrap_err(), DomainError::InvalidQuantity(0));
    }

    #[test]
    fn test_active_transitions() {
        let reservation = active();
        for next in [
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
            ReservationStatus::Expired,
        ] {
            let moved = reservation.transition_to(next, Utc::now()).unwrap();
            assert_eq!(moved.status(), next);
        }
    }

    #[test]
    fn test_terminal_states_absorb() {
        for terminal in [
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
            ReservationStatus::Expired,
        ] {
            let reservation = active().transition_to(terminal, Utc::now()).unwrap();
            assert!(terminal.is_terminal());
            for next in [
                ReservationStatus::Active,
                ReservationStatus::Confirmed,
                ReservationStatus::Cancelled,
                ReservationStatus::Expired,
            ] {
                assert!(matches!(
                    reservation.transition_to(next, Utc::now()),
                    Err(DomainError::InvalidStateTransition(_))
                ));
            }
        }
    }

    #[test]
    fn test_ensure_settleable() {
        let reservation = active();
        assert!(reservation.ensure_settleable(4).is_ok());
        assert!(matches!(
            reservation.ensure_settleable(3),
            Err(DomainError::InvalidValue(_))
        ));

        let confirmed = reservation
            .transition_to(ReservationStatus::Confirmed, Utc::now())
            .unwrap();
        assert!(matches!(
            confirmed.ensure_settleable(4),
            Err(DomainError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_is_expired_at() {
        let now = Utc::now();
        let reservation =
            Reservation::new(ProductId::new(1), OrderId::new(1), 1, Duration::seconds(10), now)
                .unwrap();
        assert!(!reservation.is_expired_at(now + Duration::seconds(10)));
        assert!(reservation.is_expired_at(now + Duration::seconds(11)));

        let cancelled = reservation
            .transition_to(ReservationStatus::Cancelled, now)
            .unwrap();
        assert!(!cancelled.is_expired_at(now + Duration::hours(1)));
    }

    #[test]
    fn test_status_string_round_trip() {
        assert_eq!(
            ReservationStatus::from_string("expired").unwrap(),
            ReservationStatus::Expired
        );
        assert!(ReservationStatus::from_string("Active").is_err());
    }

    #[test]
    fn test_release_target_maps_to_status() {
        assert_eq!(ReleaseTarget::Cancelled.status(), ReservationStatus::Cancelled);
        assert_eq!(ReleaseTarget::Expired.status(), ReservationStatus::Expired);
    }
}
