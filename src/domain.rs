// ドメイン層（エンティティ・値オブジェクト・ポート）

pub mod error;
pub mod model;
pub mod port;

pub use error::DomainError;
