use crate::domain::model::{Money, ProductId};

/// 商品カタログから取得する商品情報
/// 注文明細の作成に必要な項目のみを保持する
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub main_image: Option<String>,
}
