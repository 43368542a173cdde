// アプリケーション層（ユースケース）

pub mod command;
pub mod config;
pub mod error;
pub mod service;

pub use config::{InventorySettings, OrderSettings};
pub use error::ApplicationError;
