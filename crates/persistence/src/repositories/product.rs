//! Product catalog repository.

use domain::models::product::{CreateProductRequest, UpdateProductRequest};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::ProductEntity;
use crate::metrics::QueryTimer;

const PRODUCT_COLUMNS: &str = "id, user_id, name, description, price_cents, currency, stock, \
                               active, created_at, updated_at";

/// Repository for a tenant's products.
#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        request: &CreateProductRequest,
    ) -> Result<ProductEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_product");
        let result = sqlx::query_as::<_, ProductEntity>(&format!(
            r#"
            INSERT INTO products (user_id, name, description, price_cents, currency, stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(request.name.trim())
        .bind(&request.description)
        .bind(request.price_cents)
        .bind(request.currency.to_uppercase())
        .bind(request.stock)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<ProductEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_product_for_user");
        let result = sqlx::query_as::<_, ProductEntity>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Catalog sorted by name.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        include_inactive: bool,
    ) -> Result<Vec<ProductEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_products_for_user");
        let result = sqlx::query_as::<_, ProductEntity>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE user_id = $1 AND ($2 OR active)
            ORDER BY name, id
            "#
        ))
        .bind(user_id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Partial update. `stock: Some(None)` stops stock tracking.
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        request: &UpdateProductRequest,
    ) -> Result<Option<ProductEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_product");
        let (stock_provided, stock) = match request.stock {
            Some(stock) => (true, stock),
            None => (false, None),
        };
        let result = sqlx::query_as::<_, ProductEntity>(&format!(
            r#"
            UPDATE products
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                price_cents = COALESCE($5, price_cents),
                stock = CASE WHEN $6 THEN $7 ELSE stock END,
                active = COALESCE($8, active),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.description)
        .bind(request.price_cents)
        .bind(stock_provided)
        .bind(stock)
        .bind(request.active)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Withdraws a product from the catalog. Order history keeps referencing it.
    pub async fn deactivate(&self, user_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("deactivate_product");
        let result = sqlx::query(
            r#"
            UPDATE products
            SET active = FALSE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }
}
