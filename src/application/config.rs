use std::time::Duration;

/// 在庫サービスの設定
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySettings {
    /// 予約の有効期間
    pub reservation_ttl: chrono::Duration,
    /// 期限切れ予約の回収間隔
    pub cleanup_interval: Duration,
    /// 1回の回収処理全体のタイムアウト
    pub cleanup_timeout: Duration,
    /// 1回の回収処理で扱う予約の最大件数
    pub cleanup_batch_size: u32,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            reservation_ttl: chrono::Duration::minutes(30),
            cleanup_interval: Duration::from_secs(5 * 60),
            cleanup_timeout: Duration::from_secs(30),
            cleanup_batch_size: 100,
        }
    }
}

/// 注文サービスの設定
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSettings {
    /// 注文作成の最大試行回数
    pub max_create_attempts: u32,
    /// 再試行前の待機時間の基準値（試行回数を掛けて使う）
    pub retry_backoff: Duration,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            max_create_attempts: 3,
            retry_backoff: Duration::from_millis(10),
        }
    }
}
