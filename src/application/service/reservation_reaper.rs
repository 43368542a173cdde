use crate::application::command::CleanupReport;
use crate::application::service::{log_context, InventoryService};
use crate::domain::port::Logger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

const COMPONENT: &str = "ExpiryReaper";

/// 期限切れ予約の定期回収
///
/// 一定間隔で `InventoryService::cleanup_expired_reservations` を実行する。
/// 1回の実行全体にタイムアウトを設け、停止シグナルを受け取るまで繰り返す。
pub struct ExpiryReaper {
    inventory: Arc<InventoryService>,
    logger: Arc<dyn Logger>,
    interval: Duration,
    timeout: Duration,
}

impl ExpiryReaper {
    /// 在庫サービスの設定から回収間隔とタイムアウトを取得して作成
    pub fn new(inventory: Arc<InventoryService>, logger: Arc<dyn Logger>) -> Self {
        let interval = inventory.settings().cleanup_interval;
        let timeout = inventory.settings().cleanup_timeout;
        Self {
            inventory,
            logger,
            interval,
            timeout,
        }
    }

    /// 回収間隔を変更する
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 1回分の回収を実行する
    ///
    /// # Returns
    /// * `Some(CleanupReport)` - 回収が完了した
    /// * `None` - タイムアウトまたはエラー（ログに記録済み）
    pub async fn run_once(&self) -> Option<CleanupReport> {
        let run_id = Uuid::new_v4();
        match tokio::time::timeout(self.timeout, self.inventory.cleanup_expired_reservations())
            .await
        {
            Ok(Ok(report)) => Some(report),
            Ok(Err(err)) => {
                self.logger.error(
                    COMPONENT,
                    "期限切れ予約の取得に失敗しました",
                    Some(run_id),
                    Some(log_context([("error", err.to_string())])),
                );
                None
            }
            Err(_) => {
                self.logger.warn(
                    COMPONENT,
                    "期限切れ予約の回収がタイムアウトしました",
                    Some(run_id),
                    Some(log_context([(
                        "timeout_ms",
                        self.timeout.as_millis().to_string(),
                    )])),
                );
                None
            }
        }
    }

    /// バックグラウンドタスクとして起動する
    ///
    /// 最初の回収は1間隔経過後に行う。`shutdown` に `true` が送られるか
    /// 送信側が破棄されると停止する。
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // intervalの初回は即時に完了する
            ticker.tick().await;

            self.logger.info(
                COMPONENT,
                "期限切れ予約の定期回収を開始しました",
                None,
                Some(log_context([(
                    "interval_secs",
                    self.interval.as_secs().to_string(),
                )])),
            );

            while !*shutdown.borrow() {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            self.logger
                .info(COMPONENT, "期限切れ予約の定期回収を停止しました", None, None);
        })
    }
}
