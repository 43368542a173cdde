use crate::domain::error::DomainError;
use crate::domain::port::RepositoryError;

/// アプリケーション層のエラー型
/// ドメインエラーとリポジトリエラーをラップし、呼び出し側が種類で判断できるようにする
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    /// ドメインエラー（ビジネスルール違反）
    #[error("{0}")]
    DomainError(#[from] DomainError),
    /// エンティティが見つからない
    #[error("Not found: {0}")]
    NotFound(String),
    /// 既に存在する
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// 楽観ロックの競合（再試行可能）
    #[error("concurrent update: {0}")]
    ConcurrentUpdate(String),
    /// 再試行の上限に達した
    #[error("failed after {attempts} retries: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<ApplicationError>,
    },
    /// リポジトリエラー（永続化の失敗）
    #[error("Repository error: {0}")]
    RepositoryError(RepositoryError),
}

impl ApplicationError {
    /// 処理全体を再実行すれば成功しうるエラーかどうか
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApplicationError::ConcurrentUpdate(_))
    }
}

// 一意制約違反と競合はリポジトリの種類に依存せず同じ種類へ変換する
impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueViolation(msg) => ApplicationError::AlreadyExists(msg),
            RepositoryError::Conflict(msg) => ApplicationError::ConcurrentUpdate(msg),
            other => ApplicationError::RepositoryError(other),
        }
    }
}
