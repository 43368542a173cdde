// アプリケーションサービス
// ユースケースごとに作業単位を開始し、成功時にコミット、失敗時にロールバックする

mod inventory_service;
mod order_service;
mod reservation_reaper;

pub use inventory_service::InventoryService;
pub use order_service::OrderService;
pub use reservation_reaper::ExpiryReaper;

use crate::application::ApplicationError;
use crate::domain::port::{Logger, UnitOfWork};
use std::collections::HashMap;

/// 処理結果に応じて作業単位を完了させる
///
/// 成功ならコミットし、失敗ならロールバックして元のエラーをそのまま返す。
/// ロールバック自体の失敗はログに残すだけで、元のエラーを置き換えない。
pub(crate) async fn complete_unit_of_work<T>(
    uow: Box<dyn UnitOfWork>,
    result: Result<T, ApplicationError>,
    logger: &dyn Logger,
    component: &str,
) -> Result<T, ApplicationError> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                logger.error(
                    component,
                    "ロールバックに失敗しました",
                    None,
                    Some(log_context([
                        ("error", rollback_err.to_string()),
                        ("cause", err.to_string()),
                    ])),
                );
            }
            Err(err)
        }
    }
}

/// ログのコンテキスト情報を組み立てる
pub(crate) fn log_context<const N: usize>(pairs: [(&str, String); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
