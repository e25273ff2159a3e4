//! Tenant and subscription plan entities (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub plan_code: String,
    pub credits: i32,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserEntity> for domain::models::User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            email: entity.email,
            display_name: entity.display_name,
            plan_code: entity.plan_code,
            credits: entity.credits,
            plan_expires_at: entity.plan_expires_at,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the subscription_plans table.
#[derive(Debug, Clone, FromRow)]
pub struct PlanEntity {
    pub code: String,
    pub name: String,
    pub monthly_credits: i32,
    pub max_agents: i32,
    pub price_cents: i64,
    pub currency: String,
}

impl From<PlanEntity> for domain::models::SubscriptionPlan {
    fn from(entity: PlanEntity) -> Self {
        Self {
            code: entity.code,
            name: entity.name,
            monthly_credits: entity.monthly_credits,
            max_agents: entity.max_agents,
            price_cents: entity.price_cents,
            currency: entity.currency,
        }
    }
}
