//! Order entities (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{Order, OrderItem, OrderStatus};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the orders table.
#[derive(Debug, Clone, FromRow)]
pub struct OrderEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub contact_phone: String,
    pub status: String,
    pub total_cents: i64,
    pub currency: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl OrderEntity {
    pub fn status(&self) -> OrderStatus {
        OrderStatus::parse(&self.status).unwrap_or(OrderStatus::Pending)
    }

    /// Builds the domain order from this row and its line items.
    pub fn into_order(self, items: Vec<OrderItemEntity>) -> Order {
        let status = self.status();
        Order {
            order_id: self.id,
            user_id: self.user_id,
            conversation_id: self.conversation_id,
            contact_phone: self.contact_phone,
            status,
            total_cents: self.total_cents,
            currency: self.currency,
            items: items.into_iter().map(Into::into).collect(),
            note: self.note,
            created_at: self.created_at,
            updated_at: self.updated_at,
            validated_at: self.validated_at,
        }
    }
}

/// Database row mapping for the order_items table.
#[derive(Debug, Clone, FromRow)]
pub struct OrderItemEntity {
    pub id: i64,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

impl From<OrderItemEntity> for OrderItem {
    fn from(entity: OrderItemEntity) -> Self {
        Self {
            product_id: entity.product_id,
            product_name: entity.product_name,
            quantity: entity.quantity,
            unit_price_cents: entity.unit_price_cents,
        }
    }
}
