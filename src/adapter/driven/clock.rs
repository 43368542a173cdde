use crate::domain::port::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;

/// システム時刻
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手動で進める時計
/// 予約の期限切れなど時刻に依存する処理をローカル実行や検証で再現するために使う
#[derive(Debug)]
pub struct ManualClock {
    time: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: RwLock::new(time),
        }
    }

    /// 時刻を進める
    pub fn advance(&self, by: Duration) {
        let mut time = self
            .time
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *time += by;
    }

    /// 時刻を設定する
    pub fn set(&self, to: DateTime<Utc>) {
        let mut time = self
            .time
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *time = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .time
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
