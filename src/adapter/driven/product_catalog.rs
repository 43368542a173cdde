use crate::adapter::database_error::repository_error;
use crate::domain::model::{Money, Product, ProductId};
use crate::domain::port::{ProductCatalog, RepositoryError};
use async_trait::async_trait;
use sqlx::{MySql, Pool, Row};
use std::collections::HashMap;

/// MySQL商品カタログ
#[derive(Clone)]
pub struct MySqlProductCatalog {
    pool: Pool<MySql>,
}

impl MySqlProductCatalog {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for MySqlProductCatalog {
    async fn get_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, price, main_image FROM products WHERE id IN ({})",
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id.value());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| repository_error("商品の取得に失敗しました", e))?;

        let mut products = HashMap::with_capacity(rows.len());
        for row in rows {
            let id = ProductId::new(row.try_get("id").map_err(fetch_failed)?);
            let price = Money::new(row.try_get("price").map_err(fetch_failed)?)
                .map_err(|e| RepositoryError::FetchFailed(e.to_string()))?;
            products.insert(
                id,
                Product {
                    id,
                    name: row.try_get("name").map_err(fetch_failed)?,
                    price,
                    main_image: row.try_get("main_image").map_err(fetch_failed)?,
                },
            );
        }
        Ok(products)
    }
}

fn fetch_failed(err: sqlx::Error) -> RepositoryError {
    RepositoryError::FetchFailed(format!("商品データの解析に失敗しました: {}", err))
}
