//! Order repository.
//!
//! Status changes that touch stock run in one transaction with the order row
//! and the product rows locked, products in ascending id order.

use std::collections::BTreeMap;

use domain::models::{Order, OrderItem, OrderStatus};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{OrderEntity, OrderItemEntity};
use crate::metrics::QueryTimer;

const ORDER_COLUMNS: &str = "id, user_id, conversation_id, contact_phone, status, total_cents, \
                             currency, note, created_at, updated_at, validated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, unit_price_cents";

#[derive(Debug, Error)]
pub enum OrderUpdateError {
    #[error("order not found")]
    NotFound,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("insufficient stock for {product_name}: {available} left, {requested} requested")]
    InsufficientStock {
        product_name: String,
        available: i32,
        requested: i32,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Repository for orders and their line items.
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending order with its items.
    pub async fn create(
        &self,
        user_id: Uuid,
        conversation_id: Option<Uuid>,
        contact_phone: &str,
        currency: &str,
        items: &[OrderItem],
    ) -> Result<Order, sqlx::Error> {
        let timer = QueryTimer::new("create_order");
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, OrderEntity>(&format!(
            r#"
            INSERT INTO orders (user_id, conversation_id, contact_phone, status, total_cents, currency)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(conversation_id)
        .bind(contact_phone)
        .bind(domain::models::order::total_cents(items))
        .bind(currency)
        .fetch_one(&mut *tx)
        .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let names: Vec<String> = items.iter().map(|i| i.product_name.clone()).collect();
        let quantities: Vec<i32> = items.iter().map(|i| i.quantity).collect();
        let prices: Vec<i64> = items.iter().map(|i| i.unit_price_cents).collect();

        let rows = sqlx::query_as::<_, OrderItemEntity>(&format!(
            r#"
            INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price_cents)
            SELECT $1, * FROM UNNEST($2::uuid[], $3::text[], $4::int4[], $5::int8[])
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(order.id)
        .bind(&product_ids)
        .bind(&names)
        .bind(&quantities)
        .bind(&prices)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(order.into_order(rows))
    }

    pub async fn find_for_user(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Order>, sqlx::Error> {
        let timer = QueryTimer::new("find_order_for_user");
        let order = sqlx::query_as::<_, OrderEntity>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let result = match order {
            Some(order) => {
                let items = load_items(&self.pool, &[order.id]).await?;
                Some(order.into_order(items))
            }
            None => None,
        };
        timer.record();
        Ok(result)
    }

    /// Newest orders first, optionally filtered by status.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, sqlx::Error> {
        let timer = QueryTimer::new("list_orders_for_user");
        let orders = sqlx::query_as::<_, OrderEntity>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order: BTreeMap<Uuid, Vec<OrderItemEntity>> = BTreeMap::new();
        for item in load_items(&self.pool, &ids).await? {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        let result = orders
            .into_iter()
            .map(|o| {
                let items = items_by_order.remove(&o.id).unwrap_or_default();
                o.into_order(items)
            })
            .collect();
        timer.record();
        Ok(result)
    }

    /// Validates a pending order and takes its items out of stock.
    ///
    /// Fails without touching anything when any stock-tracked product is short.
    pub async fn validate(&self, user_id: Uuid, id: Uuid) -> Result<Order, OrderUpdateError> {
        let timer = QueryTimer::new("validate_order");
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut tx, user_id, id).await?;
        ensure_transition(order.status(), OrderStatus::Validated)?;

        let items = load_items(&mut *tx, &[order.id]).await?;
        let required = quantities_by_product(&items);
        let ids: Vec<Uuid> = required.keys().copied().collect();

        let products: Vec<(Uuid, String, Option<i32>)> = sqlx::query_as(
            r#"
            SELECT id, name, stock
            FROM products
            WHERE id = ANY($1)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        for (product_id, name, stock) in &products {
            let requested = required.get(product_id).copied().unwrap_or(0);
            if let Some(available) = stock {
                if *available < requested {
                    return Err(OrderUpdateError::InsufficientStock {
                        product_name: name.clone(),
                        available: *available,
                        requested,
                    });
                }
            }
        }

        for (product_id, quantity) in &required {
            adjust_stock(&mut tx, *product_id, -quantity).await?;
        }

        let updated = sqlx::query_as::<_, OrderEntity>(&format!(
            r#"
            UPDATE orders
            SET status = 'validated', validated_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(updated.into_order(items))
    }

    /// Moves an order to `rejected`, `cancelled` or `delivered`.
    ///
    /// Cancelling a validated order puts its items back in stock in the same
    /// transaction. `note` replaces the order note when given.
    pub async fn transition(
        &self,
        user_id: Uuid,
        id: Uuid,
        to: OrderStatus,
        note: Option<&str>,
    ) -> Result<Order, OrderUpdateError> {
        let timer = QueryTimer::new("transition_order");
        let mut tx = self.pool.begin().await?;

        let order = lock_order(&mut tx, user_id, id).await?;
        let from = order.status();
        ensure_transition(from, to)?;

        let items = load_items(&mut *tx, &[order.id]).await?;
        if from.holds_stock() && !to.holds_stock() {
            for (product_id, quantity) in quantities_by_product(&items) {
                adjust_stock(&mut tx, product_id, quantity).await?;
            }
        }

        let updated = sqlx::query_as::<_, OrderEntity>(&format!(
            r#"
            UPDATE orders
            SET status = $2, note = COALESCE($3, note), updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(note)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        Ok(updated.into_order(items))
    }

    /// Cancels the pending orders of a conversation. Pending orders hold no
    /// stock, so nothing is restocked.
    pub async fn cancel_pending_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("cancel_pending_orders_for_conversation");
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE orders
            SET status = 'cancelled', note = COALESCE(note, 'cancelled by customer'), updated_at = NOW()
            WHERE conversation_id = $1 AND status = 'pending'
            RETURNING id
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}

async fn lock_order(
    conn: &mut PgConnection,
    user_id: Uuid,
    id: Uuid,
) -> Result<OrderEntity, OrderUpdateError> {
    sqlx::query_as::<_, OrderEntity>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?
    .ok_or(OrderUpdateError::NotFound)
}

async fn load_items<'e, E>(executor: E, order_ids: &[Uuid]) -> Result<Vec<OrderItemEntity>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, OrderItemEntity>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1) ORDER BY id"
    ))
    .bind(order_ids)
    .fetch_all(executor)
    .await
}

async fn adjust_stock(conn: &mut PgConnection, product_id: Uuid, delta: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE products
        SET stock = stock + $2, updated_at = NOW()
        WHERE id = $1 AND stock IS NOT NULL
        "#,
    )
    .bind(product_id)
    .bind(delta)
    .execute(conn)
    .await?;
    Ok(())
}

fn ensure_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderUpdateError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(OrderUpdateError::InvalidTransition { from, to })
    }
}

/// Total quantity per product, keyed in ascending id order.
fn quantities_by_product(items: &[OrderItemEntity]) -> BTreeMap<Uuid, i32> {
    let mut out = BTreeMap::new();
    for item in items {
        *out.entry(item.product_id).or_insert(0) += item.quantity;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: Uuid, quantity: i32) -> OrderItemEntity {
        OrderItemEntity {
            id: 0,
            order_id: Uuid::nil(),
            product_id,
            product_name: "Savon".to_string(),
            quantity,
            unit_price_cents: 100,
        }
    }

    #[test]
    fn test_quantities_by_product_sums_and_sorts() {
        let a = Uuid::from_u128(2);
        let b = Uuid::from_u128(1);
        let totals = quantities_by_product(&[item(a, 2), item(b, 1), item(a, 3)]);
        let ordered: Vec<(Uuid, i32)> = totals.into_iter().collect();
        assert_eq!(ordered, vec![(b, 1), (a, 5)]);
    }

    #[test]
    fn test_ensure_transition() {
        assert!(ensure_transition(OrderStatus::Pending, OrderStatus::Validated).is_ok());
        assert!(matches!(
            ensure_transition(OrderStatus::Delivered, OrderStatus::Cancelled),
            Err(OrderUpdateError::InvalidTransition { .. })
        ));
    }
}
