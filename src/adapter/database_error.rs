use crate::domain::port::RepositoryError;

/// MySQLの一意制約違反
const MYSQL_DUP_ENTRY: u16 = 1062;
/// MySQLのデッドロック検出とロック待ちタイムアウト
const MYSQL_LOCK_DEADLOCK: u16 = 1213;
const MYSQL_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// 直列化失敗
const SERIALIZATION_FAILURE: &str = "40001";

/// データベースエラー型
/// データベース操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatabaseError {
    /// データベース接続エラー
    #[error("Database connection error: {0}")]
    ConnectionError(String),
    /// SQLクエリエラー
    #[error("Database query error: {0}")]
    QueryError(String),
    /// 一意制約違反
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),
    /// デッドロックや直列化失敗など、再試行で解消しうる競合
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),
    /// マイグレーションエラー
    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl DatabaseError {
    /// sqlxのエラーを分類する
    ///
    /// # Arguments
    /// * `operation` - 失敗した操作の説明（メッセージの先頭に付ける）
    /// * `err` - sqlxのエラー
    pub fn classify(operation: &str, err: sqlx::Error) -> Self {
        let message = format!("{}: {}", operation, err);
        match &err {
            sqlx::Error::Database(db_err) => {
                let mysql_code = db_err
                    .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                    .map(|e| e.number());
                let sql_state = db_err.code();
                match (mysql_code, sql_state.as_deref()) {
                    (Some(MYSQL_DUP_ENTRY), _) => DatabaseError::DuplicateEntry(message),
                    (Some(MYSQL_LOCK_DEADLOCK), _) | (Some(MYSQL_LOCK_WAIT_TIMEOUT), _) => {
                        DatabaseError::TransactionConflict(message)
                    }
                    (_, Some(SERIALIZATION_FAILURE)) => DatabaseError::TransactionConflict(message),
                    _ if db_err.is_unique_violation() => DatabaseError::DuplicateEntry(message),
                    _ => DatabaseError::QueryError(message),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(message)
            }
            _ => DatabaseError::QueryError(message),
        }
    }
}

/// DatabaseErrorからRepositoryErrorへの変換
impl From<DatabaseError> for RepositoryError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionError(msg) => RepositoryError::ConnectionFailed(msg),
            DatabaseError::QueryError(msg) => RepositoryError::OperationFailed(msg),
            DatabaseError::DuplicateEntry(msg) => RepositoryError::UniqueViolation(msg),
            DatabaseError::TransactionConflict(msg) => RepositoryError::Conflict(msg),
            DatabaseError::MigrationError(msg) => RepositoryError::OperationFailed(msg),
        }
    }
}

/// sqlxのエラーを分類してRepositoryErrorに変換する
pub(crate) fn repository_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    DatabaseError::classify(operation, err).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_repository_error() {
        assert_eq!(
            RepositoryError::from(DatabaseError::DuplicateEntry("dup".to_string())),
            RepositoryError::UniqueViolation("dup".to_string())
        );
        assert_eq!(
            RepositoryError::from(DatabaseError::TransactionConflict("deadlock".to_string())),
            RepositoryError::Conflict("deadlock".to_string())
        );
        assert_eq!(
            RepositoryError::from(DatabaseError::ConnectionError("down".to_string())),
            RepositoryError::ConnectionFailed("down".to_string())
        );
    }

    #[test]
    fn test_classify_non_database_errors() {
        let err = DatabaseError::classify("select", sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::QueryError(msg) if msg.starts_with("select: ")));

        let err = DatabaseError::classify("begin", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DatabaseError::ConnectionError(_)));
    }
}
